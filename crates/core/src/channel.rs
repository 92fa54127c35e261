use std::error::Error as StdError;

use ndarray::{Array1, ArrayView1};

use crate::{DataId, MeshId};

/// Blocking point-to-point link to one remote participant.
///
/// Every call blocks until the remote side has matched it, so both sides
/// must issue sends and receives in the same order.
pub trait Channel {
    /// Sends the values of `data` living on `mesh`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    fn send_values(
        &mut self,
        data: DataId,
        mesh: MeshId,
        values: ArrayView1<'_, f64>,
    ) -> Result<(), ChannelError>;

    /// Receives `len` values of `data` living on `mesh`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails or the message does not match.
    fn receive_values(
        &mut self,
        data: DataId,
        mesh: MeshId,
        len: usize,
    ) -> Result<Array1<f64>, ChannelError>;

    /// Sends a convergence flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    fn send_flag(&mut self, flag: bool) -> Result<(), ChannelError>;

    /// Receives a convergence flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails or the message does not match.
    fn receive_flag(&mut self) -> Result<bool, ChannelError>;

    /// Sends a scalar such as a window size.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    fn send_scalar(&mut self, value: f64) -> Result<(), ChannelError>;

    /// Receives a scalar.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails or the message does not match.
    fn receive_scalar(&mut self) -> Result<f64, ChannelError>;

    /// Sends the ids of locally changed meshes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    fn send_mesh_ids(&mut self, meshes: &[MeshId]) -> Result<(), ChannelError>;

    /// Receives the ids of remotely changed meshes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails or the message does not match.
    fn receive_mesh_ids(&mut self) -> Result<Vec<MeshId>, ChannelError>;
}

/// Link used to mirror a whole scheme's encoded state to another rank.
pub trait StateChannel {
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    fn send_state(&mut self, rank: usize, state: &[u8]) -> Result<(), ChannelError>;

    /// # Errors
    ///
    /// Returns an error if the transport fails or the message does not match.
    fn receive_state(&mut self, rank: usize) -> Result<Vec<u8>, ChannelError>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send_values(
        &mut self,
        data: DataId,
        mesh: MeshId,
        values: ArrayView1<'_, f64>,
    ) -> Result<(), ChannelError> {
        (**self).send_values(data, mesh, values)
    }

    fn receive_values(
        &mut self,
        data: DataId,
        mesh: MeshId,
        len: usize,
    ) -> Result<Array1<f64>, ChannelError> {
        (**self).receive_values(data, mesh, len)
    }

    fn send_flag(&mut self, flag: bool) -> Result<(), ChannelError> {
        (**self).send_flag(flag)
    }

    fn receive_flag(&mut self) -> Result<bool, ChannelError> {
        (**self).receive_flag()
    }

    fn send_scalar(&mut self, value: f64) -> Result<(), ChannelError> {
        (**self).send_scalar(value)
    }

    fn receive_scalar(&mut self) -> Result<f64, ChannelError> {
        (**self).receive_scalar()
    }

    fn send_mesh_ids(&mut self, meshes: &[MeshId]) -> Result<(), ChannelError> {
        (**self).send_mesh_ids(meshes)
    }

    fn receive_mesh_ids(&mut self) -> Result<Vec<MeshId>, ChannelError> {
        (**self).receive_mesh_ids()
    }
}

/// Errors surfaced by a [`Channel`] or [`StateChannel`].
///
/// Transport failures are not retried by the schemes.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("remote side disconnected")]
    Disconnected,

    #[error("expected a {expected} message, received a {found} message")]
    UnexpectedMessage {
        expected: &'static str,
        found: &'static str,
    },

    #[error("expected values of {expected}, received {found}")]
    WrongData { expected: DataId, found: DataId },

    #[error("expected values on {expected}, received values on {found}")]
    WrongMesh { expected: MeshId, found: MeshId },

    #[error("expected {expected} values of {data}, received {found}")]
    WrongLength {
        data: DataId,
        expected: usize,
        found: usize,
    },

    #[error("expected state for rank {expected}, received state for rank {found}")]
    WrongRank { expected: usize, found: usize },

    #[error("transport failed")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
}

impl ChannelError {
    pub fn transport<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}
