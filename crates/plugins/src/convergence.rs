//! Convergence measures.
//!
//! All measures work on the residual `r = new - old - q`, where `q` is the
//! design specification handed in by the scheme.

mod absolute;
mod min_iteration;
mod relative;
mod residual_relative;

use ndarray::ArrayView1;

pub use absolute::AbsoluteConvergence;
pub use min_iteration::MinIterationConvergence;
pub use relative::RelativeConvergence;
pub use residual_relative::ResidualRelativeConvergence;

/// Invalid measure parameters.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq)]
pub enum MeasureError {
    #[error("limit must be finite and positive, got {0}")]
    Limit(f64),

    #[error("relative limit must lie within (0, 1], got {0}")]
    RelativeLimit(f64),

    #[error("minimum iteration count must be at least 1")]
    MinIterations,
}

/// Euclidean norm of `new - old - q`.
fn residual_norm(
    old: ArrayView1<'_, f64>,
    new: ArrayView1<'_, f64>,
    design_specification: ArrayView1<'_, f64>,
) -> f64 {
    new.iter()
        .zip(old.iter())
        .enumerate()
        .map(|(i, (n, o))| {
            let q = design_specification.get(i).copied().unwrap_or(0.0);
            (n - o - q).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

fn check_limit(limit: f64) -> Result<f64, MeasureError> {
    if !limit.is_finite() || limit <= 0.0 {
        return Err(MeasureError::Limit(limit));
    }
    Ok(limit)
}
