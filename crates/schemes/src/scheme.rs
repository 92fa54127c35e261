use lockstep_core::{Action, DataId, MeshId, StateChannel};
use ndarray::Array1;

use crate::{CompositionalScheme, Error, MultiScheme, ParallelScheme, SerialScheme};

/// Meshes reported as changed by a synchronization phase.
pub type ChangedMeshes = Vec<MeshId>;

/// The contract every coupling scheme offers its hosting participant.
///
/// A host loop looks like:
///
/// ```text
/// initialize(t0, 1); [initialize_data()]
/// while is_coupling_ongoing():
///     fulfil required actions (checkpoints)
///     solve for dt <= next_time_step_max_length()
///     add_computed_time(dt); advance()
/// finalize()
/// ```
///
/// `advance` is split into four phases so that callers embedding a scheme
/// in a larger schedule can interleave their own work; the default
/// [`advance`](CouplingScheme::advance) runs all four in order.
pub trait CouplingScheme {
    /// Starts the coupled run at `start_time` in window `start_window`.
    ///
    /// # Errors
    ///
    /// Fails if already initialized or if the configuration is inconsistent
    /// with the added data, measures and acceleration.
    fn initialize(&mut self, start_time: f64, start_window: usize) -> Result<(), Error>;

    /// Exchanges the values of data flagged for initialization.
    ///
    /// # Errors
    ///
    /// Fails if called twice, after the first advance, or before
    /// [`Action::InitializeInitialData`] is fulfilled.
    fn initialize_data(&mut self) -> Result<(), Error>;

    /// Accounts for `dt` of solver progress within the current window.
    ///
    /// # Errors
    ///
    /// Fails if `dt` is invalid, exceeds the window remainder, or coupling
    /// has ended.
    fn add_computed_time(&mut self, dt: f64) -> Result<(), Error>;

    /// Exchanges `local_changes` with the partner(s) and returns the meshes
    /// they changed. Empty unless mesh synchronization is enabled.
    ///
    /// # Errors
    ///
    /// Fails on channel errors.
    fn first_synchronization(&mut self, local_changes: &[MeshId]) -> Result<ChangedMeshes, Error>;

    /// # Errors
    ///
    /// Fails on unfulfilled actions, phase misuse or collaborator errors.
    fn first_exchange(&mut self) -> Result<(), Error>;

    /// # Errors
    ///
    /// Fails on channel errors.
    fn second_synchronization(&mut self) -> Result<ChangedMeshes, Error>;

    /// # Errors
    ///
    /// Fails on phase misuse or collaborator errors.
    fn second_exchange(&mut self) -> Result<(), Error>;

    /// Runs all four phases.
    ///
    /// # Errors
    ///
    /// Propagates the first failing phase.
    fn advance(&mut self) -> Result<(), Error> {
        self.first_synchronization(&[])?;
        self.first_exchange()?;
        self.second_synchronization()?;
        self.second_exchange()
    }

    /// # Errors
    ///
    /// Fails if coupling is still ongoing or the scheme is not initialized.
    fn finalize(&mut self) -> Result<(), Error>;

    fn is_initialized(&self) -> bool;
    fn is_coupling_ongoing(&self) -> bool;
    fn is_time_window_complete(&self) -> bool;

    fn time(&self) -> f64;
    fn time_windows(&self) -> usize;

    fn has_time_window_size(&self) -> bool {
        self.time_window_size().is_some()
    }

    /// `None` while the first participant decides the window length.
    fn time_window_size(&self) -> Option<f64>;
    fn this_time_window_remainder(&self) -> f64;

    /// `None` if nothing bounds the next step.
    fn next_time_step_max_length(&self) -> Option<f64>;

    /// Whether a step of `last_dt` would reach the end of the window.
    fn will_data_be_exchanged(&self, last_dt: f64) -> bool;
    fn has_data_been_received(&self) -> bool;

    fn is_implicit(&self) -> bool;
    fn has_converged(&self) -> bool;
    fn iterations(&self) -> usize;

    fn is_action_required(&self, action: Action) -> bool;
    fn is_action_fulfilled(&self, action: Action) -> bool;

    /// # Errors
    ///
    /// Fails if `action` is not required.
    fn mark_action_fulfilled(&mut self, action: Action) -> Result<(), Error>;
    fn require_action(&mut self, action: Action);

    fn sends_initialized_data(&self) -> bool;

    /// Values of `data` at `relative_dt` past the current time, reconstructed
    /// from the window's time history.
    ///
    /// # Errors
    ///
    /// Fails if `data` is not coupled by this scheme or cannot be sampled.
    fn read_data(&self, data: DataId, relative_dt: f64) -> Result<Array1<f64>, Error>;
    fn couples(&self, data: DataId) -> bool;

    fn coupling_partners(&self) -> Vec<String>;

    /// Diagnostic one-liner.
    fn print_coupling_state(&self) -> String;

    /// Mirrors the scheme's bookkeeping to `rank`.
    ///
    /// # Errors
    ///
    /// Fails on encoding or channel errors.
    fn send_state(&self, channel: &mut dyn StateChannel, rank: usize) -> Result<(), Error>;

    /// Adopts the bookkeeping mirrored from `rank`.
    ///
    /// # Errors
    ///
    /// Fails on decoding or channel errors.
    fn receive_state(&mut self, channel: &mut dyn StateChannel, rank: usize)
    -> Result<(), Error>;

    fn is_compositional(&self) -> bool {
        false
    }
}

/// Every scheme topology behind one type.
pub enum Scheme {
    Serial(SerialScheme),
    Parallel(ParallelScheme),
    Multi(MultiScheme),
    Compositional(CompositionalScheme<Scheme>),
}

macro_rules! dispatch {
    ($self:expr, $scheme:ident => $body:expr) => {
        match $self {
            Scheme::Serial($scheme) => $body,
            Scheme::Parallel($scheme) => $body,
            Scheme::Multi($scheme) => $body,
            Scheme::Compositional($scheme) => $body,
        }
    };
}

impl CouplingScheme for Scheme {
    fn initialize(&mut self, start_time: f64, start_window: usize) -> Result<(), Error> {
        dispatch!(self, s => s.initialize(start_time, start_window))
    }

    fn initialize_data(&mut self) -> Result<(), Error> {
        dispatch!(self, s => s.initialize_data())
    }

    fn add_computed_time(&mut self, dt: f64) -> Result<(), Error> {
        dispatch!(self, s => s.add_computed_time(dt))
    }

    fn first_synchronization(&mut self, local_changes: &[MeshId]) -> Result<ChangedMeshes, Error> {
        dispatch!(self, s => s.first_synchronization(local_changes))
    }

    fn first_exchange(&mut self) -> Result<(), Error> {
        dispatch!(self, s => s.first_exchange())
    }

    fn second_synchronization(&mut self) -> Result<ChangedMeshes, Error> {
        dispatch!(self, s => s.second_synchronization())
    }

    fn second_exchange(&mut self) -> Result<(), Error> {
        dispatch!(self, s => s.second_exchange())
    }

    fn advance(&mut self) -> Result<(), Error> {
        dispatch!(self, s => s.advance())
    }

    fn finalize(&mut self) -> Result<(), Error> {
        dispatch!(self, s => s.finalize())
    }

    fn is_initialized(&self) -> bool {
        dispatch!(self, s => s.is_initialized())
    }

    fn is_coupling_ongoing(&self) -> bool {
        dispatch!(self, s => s.is_coupling_ongoing())
    }

    fn is_time_window_complete(&self) -> bool {
        dispatch!(self, s => s.is_time_window_complete())
    }

    fn time(&self) -> f64 {
        dispatch!(self, s => s.time())
    }

    fn time_windows(&self) -> usize {
        dispatch!(self, s => s.time_windows())
    }

    fn time_window_size(&self) -> Option<f64> {
        dispatch!(self, s => s.time_window_size())
    }

    fn this_time_window_remainder(&self) -> f64 {
        dispatch!(self, s => s.this_time_window_remainder())
    }

    fn next_time_step_max_length(&self) -> Option<f64> {
        dispatch!(self, s => s.next_time_step_max_length())
    }

    fn will_data_be_exchanged(&self, last_dt: f64) -> bool {
        dispatch!(self, s => s.will_data_be_exchanged(last_dt))
    }

    fn has_data_been_received(&self) -> bool {
        dispatch!(self, s => s.has_data_been_received())
    }

    fn is_implicit(&self) -> bool {
        dispatch!(self, s => s.is_implicit())
    }

    fn has_converged(&self) -> bool {
        dispatch!(self, s => s.has_converged())
    }

    fn iterations(&self) -> usize {
        dispatch!(self, s => s.iterations())
    }

    fn is_action_required(&self, action: Action) -> bool {
        dispatch!(self, s => s.is_action_required(action))
    }

    fn is_action_fulfilled(&self, action: Action) -> bool {
        dispatch!(self, s => s.is_action_fulfilled(action))
    }

    fn mark_action_fulfilled(&mut self, action: Action) -> Result<(), Error> {
        dispatch!(self, s => s.mark_action_fulfilled(action))
    }

    fn require_action(&mut self, action: Action) {
        dispatch!(self, s => s.require_action(action));
    }

    fn sends_initialized_data(&self) -> bool {
        dispatch!(self, s => s.sends_initialized_data())
    }

    fn read_data(&self, data: DataId, relative_dt: f64) -> Result<Array1<f64>, Error> {
        dispatch!(self, s => s.read_data(data, relative_dt))
    }

    fn couples(&self, data: DataId) -> bool {
        dispatch!(self, s => s.couples(data))
    }

    fn coupling_partners(&self) -> Vec<String> {
        dispatch!(self, s => s.coupling_partners())
    }

    fn print_coupling_state(&self) -> String {
        dispatch!(self, s => s.print_coupling_state())
    }

    fn send_state(&self, channel: &mut dyn StateChannel, rank: usize) -> Result<(), Error> {
        dispatch!(self, s => s.send_state(channel, rank))
    }

    fn receive_state(
        &mut self,
        channel: &mut dyn StateChannel,
        rank: usize,
    ) -> Result<(), Error> {
        dispatch!(self, s => s.receive_state(channel, rank))
    }

    fn is_compositional(&self) -> bool {
        matches!(self, Scheme::Compositional(_))
    }
}

impl From<SerialScheme> for Scheme {
    fn from(scheme: SerialScheme) -> Self {
        Scheme::Serial(scheme)
    }
}

impl From<ParallelScheme> for Scheme {
    fn from(scheme: ParallelScheme) -> Self {
        Scheme::Parallel(scheme)
    }
}

impl From<MultiScheme> for Scheme {
    fn from(scheme: MultiScheme) -> Self {
        Scheme::Multi(scheme)
    }
}

impl From<CompositionalScheme<Scheme>> for Scheme {
    fn from(scheme: CompositionalScheme<Scheme>) -> Self {
        Scheme::Compositional(scheme)
    }
}
