use std::error::Error as StdError;

use indexmap::IndexMap;
use ndarray::Array1;

use crate::{DataError, DataId, DataMap};

/// Relaxation numerics computing a new iterate from residual history.
///
/// A scheme calls [`initialize`](Acceleration::initialize) once, then per
/// iteration either [`perform_acceleration`](Acceleration::perform_acceleration)
/// or, when the window converged,
/// [`iterations_converged`](Acceleration::iterations_converged). The map
/// passed in is ordered; implementations may index quantities positionally.
pub trait Acceleration {
    /// Ids of the data this acceleration rewrites.
    fn data_ids(&self) -> &[DataId];

    /// # Errors
    ///
    /// Returns an error if required data is missing or parameters are invalid.
    fn initialize(&mut self, data: &DataMap) -> Result<(), AccelerationError>;

    /// Target offsets the fixed-point residual is measured against.
    ///
    /// Missing entries mean zero.
    fn design_specification(&self, _data: &DataMap) -> IndexMap<DataId, Array1<f64>> {
        IndexMap::new()
    }

    /// Overwrites the values of [`data_ids`](Acceleration::data_ids) with a
    /// new iterate.
    ///
    /// # Errors
    ///
    /// Returns an error if the new iterate cannot be computed or written.
    fn perform_acceleration(&mut self, data: &mut DataMap) -> Result<(), AccelerationError>;

    /// Called once per window after the measures reported convergence.
    ///
    /// # Errors
    ///
    /// Returns an error if internal history cannot be updated.
    fn iterations_converged(&mut self, data: &mut DataMap) -> Result<(), AccelerationError>;
}

impl<A: Acceleration + ?Sized> Acceleration for Box<A> {
    fn data_ids(&self) -> &[DataId] {
        (**self).data_ids()
    }

    fn initialize(&mut self, data: &DataMap) -> Result<(), AccelerationError> {
        (**self).initialize(data)
    }

    fn design_specification(&self, data: &DataMap) -> IndexMap<DataId, Array1<f64>> {
        (**self).design_specification(data)
    }

    fn perform_acceleration(&mut self, data: &mut DataMap) -> Result<(), AccelerationError> {
        (**self).perform_acceleration(data)
    }

    fn iterations_converged(&mut self, data: &mut DataMap) -> Result<(), AccelerationError> {
        (**self).iterations_converged(data)
    }
}

/// Errors raised by an [`Acceleration`].
#[derive(Debug, thiserror::Error)]
pub enum AccelerationError {
    #[error("acceleration needs {0}, which is not exchanged by this scheme")]
    MissingData(DataId),

    #[error("invalid acceleration parameter: {0}")]
    InvalidParameter(&'static str),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("acceleration failed")]
    Numerics(#[source] Box<dyn StdError + Send + Sync>),
}
