use lockstep_core::ConvergenceMeasure;
use ndarray::ArrayView1;

use super::{MeasureError, check_limit, residual_norm};

/// Converged once `|r| <= limit * |r_first|`, where `r_first` is the first
/// residual of the current window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualRelativeConvergence {
    limit: f64,
    first_norm: Option<f64>,
    norm_residual: f64,
    converged: bool,
}

impl ResidualRelativeConvergence {
    /// # Errors
    ///
    /// Fails unless `limit` is finite and positive.
    pub fn new(limit: f64) -> Result<Self, MeasureError> {
        Ok(Self {
            limit: check_limit(limit)?,
            first_norm: None,
            norm_residual: 0.0,
            converged: false,
        })
    }
}

impl ConvergenceMeasure for ResidualRelativeConvergence {
    fn new_measurement_series(&mut self) {
        self.first_norm = None;
        self.converged = false;
    }

    fn measure(
        &mut self,
        old: ArrayView1<'_, f64>,
        new: ArrayView1<'_, f64>,
        design_specification: ArrayView1<'_, f64>,
    ) {
        self.norm_residual = residual_norm(old, new, design_specification);
        let first = *self.first_norm.get_or_insert(self.norm_residual);
        self.converged = self.norm_residual <= self.limit * first;
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn norm_residual(&self) -> f64 {
        self.norm_residual
    }

    fn describe(&self) -> String {
        format!(
            "residual relative convergence: |r| = {:e}, |r_first| = {:e}, limit = {:e}, converged = {}",
            self.norm_residual,
            self.first_norm.unwrap_or(0.0),
            self.limit,
            self.converged
        )
    }
}
