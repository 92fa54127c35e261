use lockstep_core::Actions;
use serde::{Deserialize, Serialize};

/// Lifecycle of a coupling scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Initialized,
    Finalized,
}

/// Complete bookkeeping of a scheme, as mirrored to other ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeState {
    pub lifecycle: Lifecycle,
    pub time: f64,
    pub window_start_time: f64,
    pub time_windows: usize,
    pub computed_time_window_part: f64,
    pub time_window_size: Option<f64>,
    pub time_window_complete: bool,
    pub data_received: bool,
    pub has_converged: bool,
    pub required_actions: Actions,
    pub fulfilled_actions: Actions,
    pub iterations: usize,
    pub total_iterations: usize,
}

impl SchemeState {
    /// Encodes the state for a [`StateChannel`](lockstep_core::StateChannel).
    ///
    /// # Errors
    ///
    /// Fails if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// # Errors
    ///
    /// Fails if `bytes` is not an encoded state.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Summary of one completed time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: usize,
    /// Iterations the window took; 1 for explicit coupling.
    pub iterations: usize,
    /// Iterations since the start of the run, this window included.
    pub total_iterations: usize,
}
