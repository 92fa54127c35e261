use lockstep_core::ConvergenceMeasure;
use ndarray::ArrayView1;

use super::{MeasureError, residual_norm};

/// Converged once `|r| <= limit * |new|`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeConvergence {
    limit: f64,
    norm_residual: f64,
    norm_new: f64,
    converged: bool,
}

impl RelativeConvergence {
    /// # Errors
    ///
    /// Fails unless `limit` lies within `(0, 1]`.
    pub fn new(limit: f64) -> Result<Self, MeasureError> {
        if !(limit > 0.0 && limit <= 1.0) {
            return Err(MeasureError::RelativeLimit(limit));
        }
        Ok(Self {
            limit,
            norm_residual: 0.0,
            norm_new: 0.0,
            converged: false,
        })
    }
}

impl ConvergenceMeasure for RelativeConvergence {
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
        self.norm_new = new.dot(&new).sqrt();
        self.converged = self.norm_residual <= self.limit * self.norm_new;
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn norm_residual(&self) -> f64 {
        self.norm_residual
    }

    fn describe(&self) -> String {
        let ratio = if self.norm_new > 0.0 {
            self.norm_residual / self.norm_new
        } else {
            f64::INFINITY
        };
        format!(
            "relative convergence: |r| / |new| = {ratio:e}, limit = {:e}, converged = {}",
            self.limit, self.converged
        )
    }
}
