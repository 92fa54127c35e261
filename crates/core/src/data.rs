//! Meshes, fields and the coupling data wrapped around them.
//!
//! The host owns [`Mesh`]es and [`Field`]s and hands shared handles to a
//! scheme. A [`CouplingData`] adds what the scheme tracks per exchanged field:
//! the previous iterate, the window's time history and a short ring of
//! finished windows.

mod coupling;
mod field;
mod mesh;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::time::{StorageError, WaveformError};

pub use coupling::{CouplingData, DataSettings, Direction};
pub use field::Field;
pub use mesh::Mesh;

/// Coupling data by id, in a deterministic order.
///
/// Acceleration addresses exchanged quantities by position, so the order of
/// this map is part of the protocol.
pub type DataMap = IndexMap<DataId, CouplingData>;

/// Identifies a field across participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataId(pub usize);

/// Identifies a mesh across participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub usize);

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data #{}", self.0)
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh #{}", self.0)
    }
}

/// Errors raised while reading or writing coupling data.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum DataError {
    #[error("{id} holds {expected} values, got {found}")]
    SizeMismatch {
        id: DataId,
        expected: usize,
        found: usize,
    },

    #[error("time history of {id} rejected a write")]
    Storage {
        id: DataId,
        #[source]
        source: StorageError,
    },

    #[error("cannot reconstruct {id}")]
    Waveform {
        id: DataId,
        #[source]
        source: WaveformError,
    },
}
