use lockstep_core::ConvergenceMeasure;
use ndarray::ArrayView1;

use super::{MeasureError, check_limit, residual_norm};

/// Converged once `|r| <= limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteConvergence {
    limit: f64,
    norm_residual: f64,
    converged: bool,
}

impl AbsoluteConvergence {
    /// # Errors
    ///
    /// Fails unless `limit` is finite and positive.
    pub fn new(limit: f64) -> Result<Self, MeasureError> {
        Ok(Self {
            limit: check_limit(limit)?,
            norm_residual: 0.0,
            converged: false,
        })
    }
}

impl ConvergenceMeasure for AbsoluteConvergence {
    fn new_measurement_series(&mut self) {
        self.converged = false;
    }

    fn measure(
        &mut self,
        old: ArrayView1<'_, f64>,
        new: ArrayView1<'_, f64>,
        design_specification: ArrayView1<'_, f64>,
    ) {
        self.norm_residual = residual_norm(old, new, design_specification);
        self.converged = self.norm_residual <= self.limit;
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn norm_residual(&self) -> f64 {
        self.norm_residual
    }

    fn describe(&self) -> String {
        format!(
            "absolute convergence: |r| = {:e}, limit = {:e}, converged = {}",
            self.norm_residual, self.limit, self.converged
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    #[test]
    fn converges_below_limit() {
        let mut measure = AbsoluteConvergence::new(0.1).expect("valid limit");
        let zeros = array![0.0, 0.0];

        measure.measure(array![1.0, 1.0].view(), array![1.2, 1.0].view(), zeros.view());
        assert!(!measure.is_converged());

        measure.measure(array![1.0, 1.0].view(), array![1.05, 1.0].view(), zeros.view());
        assert!(measure.is_converged());
        assert!(measure.describe().contains("converged = true"));

        measure.new_measurement_series();
        assert!(!measure.is_converged());
    }

    #[test]
    fn rejects_bad_limits() {
        assert_eq!(
            AbsoluteConvergence::new(0.0),
            Err(MeasureError::Limit(0.0))
        );
        assert!(AbsoluteConvergence::new(f64::NAN).is_err());
    }
}
