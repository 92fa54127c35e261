//! Window, sub-cycling and checkpoint bookkeeping shared by all topologies.
//!
//! A topology owns a [`BaseScheme`] and its channel(s). It decides the order
//! of sends and receives; the base tracks time, actions, iterations and the
//! coupling data, and runs the implicit step.

mod exchange;
mod implicit;

use std::rc::Rc;

use lockstep_core::{
    Acceleration, Action, ActionLedger, ConvergenceMeasure, CouplingData, DataId, DataMap,
    DataSettings, Direction, Field, Mesh, Storage, Tolerance, WindowGrid,
};
use ndarray::Array1;
use tracing::{debug, info, warn};

use crate::state::{Lifecycle, SchemeState, WindowReport};
use crate::{Config, ConfigError, CouplingMode, Error, TimeWindowSize};

pub(crate) use implicit::MeasureSlot;

/// Who decides the window length when it is not fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowSizeExchange {
    None,
    Sends,
    Receives,
}

#[derive(Debug, Clone, Copy, Default)]
struct InitialData {
    sends: bool,
    receives: bool,
    requested: bool,
    exchanged: bool,
}

impl InitialData {
    fn pending(&self) -> bool {
        (self.sends || self.receives) && !self.exchanged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    FirstExchanged,
}

pub(crate) struct BaseScheme {
    config: Config,
    tolerance: Tolerance,
    window_size_exchange: WindowSizeExchange,
    measures_convergence: bool,
    lifecycle: Lifecycle,
    phase: Phase,
    time: f64,
    window_start_time: f64,
    computed: f64,
    window_size: Option<f64>,
    time_windows: usize,
    window_complete: bool,
    data_received: bool,
    converged: bool,
    advanced: bool,
    actions: ActionLedger,
    initial_data: InitialData,
    iterations: usize,
    total_iterations: usize,
    reports: Vec<WindowReport>,
    data: DataMap,
    measures: Vec<MeasureSlot>,
    acceleration: Option<Box<dyn Acceleration>>,
}

impl BaseScheme {
    /// `measures_convergence` marks the side that evaluates measures and
    /// runs the acceleration.
    pub(crate) fn new(
        config: Config,
        window_size_exchange: WindowSizeExchange,
        measures_convergence: bool,
    ) -> Result<Self, Error> {
        config.validate()?;
        let tolerance = config.tolerance()?;
        let window_size = match config.time_window_size {
            TimeWindowSize::Fixed(size) => Some(size),
            TimeWindowSize::FirstParticipant => None,
        };
        Ok(Self {
            config,
            tolerance,
            window_size_exchange,
            measures_convergence,
            lifecycle: Lifecycle::Uninitialized,
            phase: Phase::Idle,
            time: 0.0,
            window_start_time: 0.0,
            computed: 0.0,
            window_size,
            time_windows: 1,
            window_complete: false,
            data_received: false,
            converged: false,
            advanced: false,
            actions: ActionLedger::default(),
            initial_data: InitialData::default(),
            iterations: 1,
            total_iterations: 0,
            reports: Vec::new(),
            data: DataMap::new(),
            measures: Vec::new(),
            acceleration: None,
        })
    }

    pub(crate) fn add_data(
        &mut self,
        field: Rc<Field>,
        mesh: &Rc<Mesh>,
        direction: Direction,
        partner: usize,
        requires_initialization: bool,
    ) -> Result<(), Error> {
        if self.lifecycle != Lifecycle::Uninitialized {
            return Err(Error::DataAfterInitialize);
        }
        let id = field.id();
        if self.data.contains_key(&id) {
            return Err(Error::DuplicateData(id));
        }
        let settings = DataSettings {
            partner,
            requires_initialization,
            interpolation_order: self.config.interpolation_order,
            extrapolation: self.config.extrapolation_order,
            tolerance: self.tolerance,
        };
        let data = CouplingData::new(field, mesh, direction, settings)?;
        debug!(data = %id, ?direction, partner, "added coupling data");
        self.data.insert(id, data);
        Ok(())
    }

    pub(crate) fn add_measure(&mut self, slot: MeasureSlot) -> Result<(), Error> {
        if self.lifecycle != Lifecycle::Uninitialized {
            return Err(Error::DataAfterInitialize);
        }
        self.measures.push(slot);
        Ok(())
    }

    pub(crate) fn set_acceleration(&mut self, acceleration: Box<dyn Acceleration>) {
        self.acceleration = Some(acceleration);
    }

    pub(crate) fn add_measure_boxed(
        &mut self,
        data: DataId,
        suffices: bool,
        measure: Box<dyn ConvergenceMeasure>,
    ) -> Result<(), Error> {
        self.add_measure(MeasureSlot {
            data,
            suffices,
            measure,
        })
    }

    /// Ids of the data the acceleration rewrites, if any.
    pub(crate) fn accelerated_ids(&self) -> Vec<DataId> {
        self.acceleration
            .as_ref()
            .map(|acceleration| acceleration.data_ids().to_vec())
            .unwrap_or_default()
    }

    pub(crate) fn initialize(&mut self, start_time: f64, start_window: usize) -> Result<(), Error> {
        match self.lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Initialized => return Err(Error::AlreadyInitialized),
            Lifecycle::Finalized => return Err(Error::Finalized),
        }
        if !self.config.is_implicit() && (self.acceleration.is_some() || !self.measures.is_empty())
        {
            return Err(ConfigError::ImplicitOnly("convergence measures and acceleration").into());
        }

        // Partner-major, sends before receives, insertion order otherwise.
        self.data.sort_by(|_, a, _, b| {
            let rank = |data: &CouplingData| (data.partner(), data.direction() == Direction::Receive);
            rank(a).cmp(&rank(b))
        });

        self.time = start_time;
        self.window_start_time = start_time;
        self.computed = 0.0;
        self.time_windows = start_window;
        for data in self.data.values_mut() {
            data.initialize_storage();
        }

        self.initial_data.sends = self
            .data
            .values()
            .any(|data| data.direction() == Direction::Send && data.requires_initialization());
        self.initial_data.receives = self
            .data
            .values()
            .any(|data| data.direction() == Direction::Receive && data.requires_initialization());

        if self.config.is_implicit() && self.measures_convergence {
            self.initialize_implicit()?;
        }

        if self.initial_data.sends {
            self.actions.require(Action::InitializeInitialData);
        }
        if self.config.is_implicit() {
            self.actions.require(Action::WriteCheckpoint);
        }
        self.iterations = 1;
        self.lifecycle = Lifecycle::Initialized;
        info!(
            time = start_time,
            window = start_window,
            mode = ?self.config.coupling_mode,
            "coupling scheme initialized"
        );
        Ok(())
    }

    /// Checks the preconditions of `initialize_data`.
    ///
    /// Returns `false` when nothing needs to be exchanged.
    pub(crate) fn begin_initialize_data(&mut self) -> Result<bool, Error> {
        self.ensure_initialized()?;
        if self.initial_data.requested {
            return Err(Error::InitializeDataTwice);
        }
        if self.advanced {
            return Err(Error::InitializeDataAfterAdvance);
        }
        if !self.initial_data.sends && !self.initial_data.receives {
            self.initial_data.requested = true;
            warn!("initialize_data called, but no coupling data requires initialization");
            return Ok(false);
        }
        if self.actions.is_required(Action::InitializeInitialData) {
            return Err(Error::UnfulfilledActions(
                [Action::InitializeInitialData].into_iter().collect(),
            ));
        }
        self.initial_data.requested = true;
        Ok(true)
    }

    pub(crate) fn finish_initialize_data(&mut self) {
        self.initial_data.exchanged = true;
        if self.initial_data.receives {
            self.data_received = true;
        }
        debug!("initial data exchanged");
    }

    /// Opens an advance: checks actions and resets per-advance flags.
    pub(crate) fn begin_advance(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        if self.phase != Phase::Idle {
            return Err(Error::PhaseOrder("first_exchange"));
        }
        if self.initial_data.pending() {
            return Err(Error::InitialDataPending);
        }
        let pending = self.actions.required();
        if !pending.is_empty() {
            return Err(Error::UnfulfilledActions(pending));
        }
        self.actions.clear_fulfilled();
        self.advanced = true;
        self.window_complete = false;
        self.data_received = false;
        self.phase = Phase::FirstExchanged;
        Ok(())
    }

    pub(crate) fn begin_second_exchange(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        if self.phase != Phase::FirstExchanged {
            return Err(Error::PhaseOrder("second_exchange"));
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    pub(crate) fn ensure_initialized(&self) -> Result<(), Error> {
        match self.lifecycle {
            Lifecycle::Uninitialized => Err(Error::NotInitialized),
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Finalized => Err(Error::Finalized),
        }
    }

    pub(crate) fn add_computed_time(&mut self, dt: f64) -> Result<(), Error> {
        self.ensure_initialized()?;
        if !self.is_coupling_ongoing() {
            return Err(Error::CouplingFinished);
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(Error::InvalidTimeStep(dt));
        }
        if let Some(remainder) = self.window_remainder() {
            if self.tolerance.greater(dt, remainder) {
                return Err(Error::TimeStepExceedsWindow { dt, remainder });
            }
        }

        self.computed += dt;
        self.time = self.window_start_time + self.computed;
        debug!(dt, time = self.time, "added computed time");

        if let Some(length) = self.window_length() {
            if !self.reached_end_of_window() && self.computed > 0.0 {
                self.store_send_samples(self.computed / length)?;
            }
        }
        Ok(())
    }

    /// Length of the current window; the last window may be cut short by
    /// `max_time`.
    fn window_length(&self) -> Option<f64> {
        let size = self.window_size?;
        match self.config.max_time {
            Some(max_time)
                if self
                    .tolerance
                    .smaller(max_time - self.window_start_time, size) =>
            {
                Some((max_time - self.window_start_time).max(0.0))
            }
            _ => Some(size),
        }
    }

    fn window_remainder(&self) -> Option<f64> {
        self.window_length().map(|length| length - self.computed)
    }

    /// Without a window size every advance ends a window.
    pub(crate) fn reached_end_of_window(&self) -> bool {
        self.window_remainder()
            .is_none_or(|remainder| !self.tolerance.greater(remainder, 0.0))
    }

    fn store_send_samples(&mut self, time: f64) -> Result<(), Error> {
        for data in self.data.values_mut() {
            if data.direction() == Direction::Send {
                data.store_sample(time)?;
            }
        }
        Ok(())
    }

    /// Stores the values written for this window at the window end.
    pub(crate) fn store_window_end(&mut self) -> Result<(), Error> {
        self.store_send_samples(Storage::WINDOW_END)
    }

    pub(crate) fn move_to_next_window(&mut self) -> Result<(), Error> {
        for data in self.data.values_mut() {
            data.move_to_next_window()?;
        }
        Ok(())
    }

    /// Closes an exchange at the window end: either completes the window or,
    /// for an unconverged implicit iteration, rolls time back for a retry.
    pub(crate) fn finish_iteration(&mut self) {
        self.total_iterations += 1;
        if self.config.is_implicit() && !self.converged {
            self.actions.require(Action::ReadCheckpoint);
            self.iterations += 1;
            self.computed = 0.0;
            self.time = self.window_start_time;
            self.window_complete = false;
            debug!(
                window = self.time_windows,
                iteration = self.iterations,
                "no convergence, repeating time window"
            );
            return;
        }

        self.reports.push(WindowReport {
            window: self.time_windows,
            iterations: self.iterations,
            total_iterations: self.total_iterations,
        });
        info!(
            window = self.time_windows,
            iterations = self.iterations,
            "time window completed"
        );
        self.window_start_time += self.computed;
        self.time = self.window_start_time;
        self.computed = 0.0;
        self.time_windows += 1;
        self.iterations = 1;
        self.window_complete = true;
        if self.config.is_implicit() && self.is_coupling_ongoing() {
            self.actions.require(Action::WriteCheckpoint);
        }
    }

    pub(crate) fn finalize(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        if self.is_coupling_ongoing() {
            return Err(Error::StillOngoing);
        }
        self.lifecycle = Lifecycle::Finalized;
        info!(windows = self.reports.len(), "coupling scheme finalized");
        Ok(())
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.lifecycle == Lifecycle::Initialized
    }

    pub(crate) fn is_coupling_ongoing(&self) -> bool {
        if self.lifecycle == Lifecycle::Finalized {
            return false;
        }
        let time_left = self
            .config
            .max_time
            .is_none_or(|max_time| self.tolerance.greater(max_time, self.time));
        let windows_left = self
            .config
            .max_time_windows
            .is_none_or(|max_windows| self.time_windows <= max_windows);
        time_left && windows_left
    }

    pub(crate) fn is_time_window_complete(&self) -> bool {
        self.window_complete
    }

    pub(crate) fn time(&self) -> f64 {
        self.time
    }

    pub(crate) fn time_windows(&self) -> usize {
        self.time_windows
    }

    pub(crate) fn time_window_size(&self) -> Option<f64> {
        self.window_size
    }

    pub(crate) fn this_time_window_remainder(&self) -> f64 {
        self.window_remainder().map_or(0.0, |remainder| remainder.max(0.0))
    }

    pub(crate) fn next_time_step_max_length(&self) -> Option<f64> {
        if let Some(remainder) = self.window_remainder() {
            return Some(remainder.max(0.0));
        }
        self.config
            .max_time
            .map(|max_time| (max_time - self.time).max(0.0))
    }

    pub(crate) fn will_data_be_exchanged(&self, last_dt: f64) -> bool {
        let remainder = self.this_time_window_remainder() - last_dt;
        !self.tolerance.greater(remainder, 0.0)
    }

    pub(crate) fn has_data_been_received(&self) -> bool {
        self.data_received
    }

    pub(crate) fn is_implicit(&self) -> bool {
        self.config.coupling_mode == CouplingMode::Implicit
    }

    /// Explicit schemes count every completed window as converged.
    pub(crate) fn has_converged(&self) -> bool {
        !self.is_implicit() || self.converged
    }

    pub(crate) fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn total_iterations(&self) -> usize {
        self.total_iterations
    }

    pub(crate) fn window_reports(&self) -> &[WindowReport] {
        &self.reports
    }

    pub(crate) fn sends_initialized_data(&self) -> bool {
        self.initial_data.sends
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn data(&self) -> &DataMap {
        &self.data
    }

    pub(crate) fn is_action_required(&self, action: Action) -> bool {
        self.actions.is_required(action)
    }

    pub(crate) fn is_action_fulfilled(&self, action: Action) -> bool {
        self.actions.is_fulfilled(action)
    }

    pub(crate) fn mark_action_fulfilled(&mut self, action: Action) -> Result<(), Error> {
        if !self.actions.fulfil(action) {
            return Err(Error::ActionNotRequired(action));
        }
        debug!(%action, "action fulfilled");
        Ok(())
    }

    pub(crate) fn require_action(&mut self, action: Action) {
        self.actions.require(action);
    }

    /// Values of `data` at `relative_dt` past the current point of the window,
    /// reconstructed from the window's time history.
    pub(crate) fn read_data(
        &self,
        data: DataId,
        relative_dt: f64,
    ) -> Result<Array1<f64>, Error> {
        let coupling = self.data.get(&data).ok_or(Error::UnknownData(data))?;
        let normalized = match self.window_length() {
            Some(length) => {
                let grid = WindowGrid::new(
                    self.window_start_time,
                    self.window_start_time + length,
                );
                grid.normalize(self.time + relative_dt, self.tolerance)
                    .clamp(0.0, 1.0)
            }
            None => Storage::WINDOW_END,
        };
        Ok(coupling.sample(normalized)?)
    }

    /// One-line diagnostic summary.
    pub(crate) fn print_state(&self) -> String {
        fn bound<T: ToString>(value: Option<T>) -> String {
            value.map_or_else(|| "-".to_owned(), |value| value.to_string())
        }
        fn yes_no(flag: bool) -> &'static str {
            if flag { "yes" } else { "no" }
        }

        let mut parts = Vec::new();
        if self.is_implicit() {
            parts.push(format!(
                "it {} of {}",
                self.iterations,
                bound(self.config.max_iterations)
            ));
        }
        parts.push(format!(
            "tw {} of {}",
            self.time_windows,
            bound(self.config.max_time_windows)
        ));
        parts.push(format!("t {} of {}", self.time, bound(self.config.max_time)));
        parts.push(format!("tw-size {}", bound(self.window_size)));
        parts.push(format!("max-dt {}", bound(self.next_time_step_max_length())));
        parts.push(format!("ongoing {}", yes_no(self.is_coupling_ongoing())));
        parts.push(format!("tw-complete {}", yes_no(self.window_complete)));
        let required = self.actions.required();
        if !required.is_empty() {
            parts.push(required.to_string());
        }
        parts.join(" | ")
    }

    pub(crate) fn state(&self) -> SchemeState {
        SchemeState {
            lifecycle: self.lifecycle,
            time: self.time,
            window_start_time: self.window_start_time,
            time_windows: self.time_windows,
            computed_time_window_part: self.computed,
            time_window_size: self.window_size,
            time_window_complete: self.window_complete,
            data_received: self.data_received,
            has_converged: self.converged,
            required_actions: self.actions.required(),
            fulfilled_actions: self.actions.fulfilled(),
            iterations: self.iterations,
            total_iterations: self.total_iterations,
        }
    }

    pub(crate) fn apply_state(&mut self, state: &SchemeState) {
        self.lifecycle = state.lifecycle;
        self.time = state.time;
        self.window_start_time = state.window_start_time;
        self.time_windows = state.time_windows;
        self.computed = state.computed_time_window_part;
        self.window_size = state.time_window_size;
        self.window_complete = state.time_window_complete;
        self.data_received = state.data_received;
        self.converged = state.has_converged;
        self.actions = ActionLedger::restore(state.required_actions, state.fulfilled_actions);
        self.iterations = state.iterations;
        self.total_iterations = state.total_iterations;
    }
}

/// Implements the [`CouplingScheme`](crate::CouplingScheme) methods that only
/// consult the base, for a topology with a `base` field.
macro_rules! delegate_to_base {
    () => {
        fn add_computed_time(&mut self, dt: f64) -> Result<(), $crate::Error> {
            self.base.add_computed_time(dt)
        }

        fn finalize(&mut self) -> Result<(), $crate::Error> {
            self.base.finalize()
        }

        fn is_initialized(&self) -> bool {
            self.base.is_initialized()
        }

        fn is_coupling_ongoing(&self) -> bool {
            self.base.is_coupling_ongoing()
        }

        fn is_time_window_complete(&self) -> bool {
            self.base.is_time_window_complete()
        }

        fn time(&self) -> f64 {
            self.base.time()
        }

        fn time_windows(&self) -> usize {
            self.base.time_windows()
        }

        fn time_window_size(&self) -> Option<f64> {
            self.base.time_window_size()
        }

        fn this_time_window_remainder(&self) -> f64 {
            self.base.this_time_window_remainder()
        }

        fn next_time_step_max_length(&self) -> Option<f64> {
            self.base.next_time_step_max_length()
        }

        fn will_data_be_exchanged(&self, last_dt: f64) -> bool {
            self.base.will_data_be_exchanged(last_dt)
        }

        fn has_data_been_received(&self) -> bool {
            self.base.has_data_been_received()
        }

        fn is_implicit(&self) -> bool {
            self.base.is_implicit()
        }

        fn has_converged(&self) -> bool {
            self.base.has_converged()
        }

        fn iterations(&self) -> usize {
            self.base.iterations()
        }

        fn is_action_required(&self, action: lockstep_core::Action) -> bool {
            self.base.is_action_required(action)
        }

        fn is_action_fulfilled(&self, action: lockstep_core::Action) -> bool {
            self.base.is_action_fulfilled(action)
        }

        fn mark_action_fulfilled(
            &mut self,
            action: lockstep_core::Action,
        ) -> Result<(), $crate::Error> {
            self.base.mark_action_fulfilled(action)
        }

        fn require_action(&mut self, action: lockstep_core::Action) {
            self.base.require_action(action);
        }

        fn sends_initialized_data(&self) -> bool {
            self.base.sends_initialized_data()
        }

        fn read_data(
            &self,
            data: lockstep_core::DataId,
            relative_dt: f64,
        ) -> Result<ndarray::Array1<f64>, $crate::Error> {
            self.base.read_data(data, relative_dt)
        }

        fn couples(&self, data: lockstep_core::DataId) -> bool {
            self.base.data().contains_key(&data)
        }

        fn print_coupling_state(&self) -> String {
            self.base.print_state()
        }

        fn send_state(
            &self,
            channel: &mut dyn lockstep_core::StateChannel,
            rank: usize,
        ) -> Result<(), $crate::Error> {
            let bytes = self.base.state().encode()?;
            channel.send_state(rank, &bytes)?;
            Ok(())
        }

        fn receive_state(
            &mut self,
            channel: &mut dyn lockstep_core::StateChannel,
            rank: usize,
        ) -> Result<(), $crate::Error> {
            let bytes = channel.receive_state(rank)?;
            let state = $crate::SchemeState::decode(&bytes)?;
            self.base.apply_state(&state);
            Ok(())
        }
    };
}

pub(crate) use delegate_to_base;
