use lockstep_core::ConvergenceMeasure;
use ndarray::ArrayView1;

use super::MeasureError;

/// Converged once the window has seen at least `min_iterations` iterates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinIterationConvergence {
    min_iterations: usize,
    iterations: usize,
}

impl MinIterationConvergence {
    /// # Errors
    ///
    /// Fails if `min_iterations` is zero.
    pub fn new(min_iterations: usize) -> Result<Self, MeasureError> {
        if min_iterations == 0 {
            return Err(MeasureError::MinIterations);
        }
        Ok(Self {
            min_iterations,
            iterations: 0,
        })
    }
}

impl ConvergenceMeasure for MinIterationConvergence {
    fn new_measurement_series(&mut self) {
        self.iterations = 0;
    }

    fn measure(
        &mut self,
        _old: ArrayView1<'_, f64>,
        _new: ArrayView1<'_, f64>,
        _design_specification: ArrayView1<'_, f64>,
    ) {
        self.iterations += 1;
    }

    fn is_converged(&self) -> bool {
        self.iterations >= self.min_iterations
    }

    fn norm_residual(&self) -> f64 {
        0.0
    }

    fn describe(&self) -> String {
        format!(
            "min iteration convergence: {} of {} iterations",
            self.iterations, self.min_iterations
        )
    }
}
