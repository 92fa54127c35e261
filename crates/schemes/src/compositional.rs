//! Several schemes behind one participant-facing schedule.
//!
//! Schemes run in configured order. At most one of them is implicit; the
//! ones before it lead and the ones after it trail. While the implicit scheme
//! iterates only it is advanced. Once it completes a window, each trailing
//! scheme catches up on the window's time before the next window begins.
//! Schemes that have finished their run drop out of the schedule; once the
//! implicit scheme has finished, the trailing schemes are driven directly.

use lockstep_core::{Action, DataId, MeshId, StateChannel, Tolerance};
use ndarray::Array1;
use tracing::{debug, trace};

use crate::{ChangedMeshes, CouplingScheme, Error, Scheme};

pub struct CompositionalScheme<S = Scheme> {
    schemes: Vec<S>,
    /// Finished schemes, as of the end of the last step.
    finished: Vec<bool>,
    implicit: Option<usize>,
    iterating: bool,
    /// Time the trailing schemes are owed for the current window.
    trailing_time: f64,
    tolerance: Tolerance,
}

impl<S: CouplingScheme> Default for CompositionalScheme<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CouplingScheme> CompositionalScheme<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tolerance(Tolerance::default())
    }

    /// Uses `tolerance` to decide when trailing schemes have caught up.
    #[must_use]
    pub fn with_tolerance(tolerance: Tolerance) -> Self {
        Self {
            schemes: Vec::new(),
            finished: Vec::new(),
            implicit: None,
            iterating: false,
            trailing_time: 0.0,
            tolerance,
        }
    }

    /// Appends `scheme` to the schedule.
    ///
    /// # Errors
    ///
    /// Fails for a compositional scheme or a second implicit scheme.
    pub fn add_scheme(&mut self, scheme: S) -> Result<(), Error> {
        if scheme.is_compositional() {
            return Err(Error::NestedComposition);
        }
        if scheme.is_implicit() {
            if self.implicit.is_some() {
                return Err(Error::MultipleImplicitSchemes);
            }
            self.implicit = Some(self.schemes.len());
        }
        self.schemes.push(scheme);
        self.finished.push(false);
        Ok(())
    }

    #[must_use]
    pub fn schemes(&self) -> &[S] {
        &self.schemes
    }

    /// Whether the implicit scheme is repeating a window.
    #[must_use]
    pub fn is_iterating(&self) -> bool {
        self.iterating
    }

    /// The implicit scheme, unless it has finished its run.
    fn running_implicit(&self) -> Option<usize> {
        self.implicit.filter(|&implicit| !self.finished[implicit])
    }

    /// Whether the host drives scheme `index` in the current step.
    fn is_active(&self, index: usize) -> bool {
        if self.finished[index] {
            return false;
        }
        match self.running_implicit() {
            None => true,
            Some(implicit) if self.iterating => index == implicit,
            Some(implicit) => index <= implicit,
        }
    }

    fn active_schemes(&self) -> impl Iterator<Item = &S> {
        self.schemes
            .iter()
            .enumerate()
            .filter(move |(index, _)| self.is_active(*index))
            .map(|(_, scheme)| scheme)
    }

    /// Schemes still running; all of them once every scheme has finished.
    fn running_schemes(&self) -> impl Iterator<Item = &S> {
        let all_finished = self.finished.iter().all(|finished| *finished);
        self.schemes
            .iter()
            .zip(&self.finished)
            .filter(move |(_, finished)| all_finished || !**finished)
            .map(|(scheme, _)| scheme)
    }

    /// Applies `phase` to every active scheme, in schedule order.
    fn for_each_active(
        &mut self,
        mut phase: impl FnMut(&mut S) -> Result<(), Error>,
    ) -> Result<(), Error> {
        for index in 0..self.schemes.len() {
            if self.is_active(index) {
                phase(&mut self.schemes[index])?;
            }
        }
        Ok(())
    }

    /// Records which schemes have ended; called between steps only, since a
    /// scheme reaching its final time mid-window still has to exchange.
    fn update_finished(&mut self) {
        for (finished, scheme) in self.finished.iter_mut().zip(&self.schemes) {
            if !*finished && !scheme.is_coupling_ongoing() {
                debug!("composed scheme finished its run");
                *finished = true;
            }
        }
    }

    /// Runs each trailing scheme over the time it is owed, in steps its own
    /// windows allow.
    fn advance_trailing(&mut self, implicit: usize) -> Result<(), Error> {
        let owed = self.trailing_time;
        let tolerance = self.tolerance;
        for scheme in &mut self.schemes[implicit + 1..] {
            let mut left = owed;
            while tolerance.greater(left, 0.0) && scheme.is_coupling_ongoing() {
                let step = scheme
                    .next_time_step_max_length()
                    .map_or(left, |max| left.min(max));
                if !tolerance.greater(step, 0.0) {
                    break;
                }
                scheme.add_computed_time(step)?;
                scheme.advance()?;
                left -= step;
            }
            trace!(owed, left, "trailing scheme caught up");
        }
        self.trailing_time = 0.0;
        Ok(())
    }

    fn collect_changes(
        &mut self,
        mut phase: impl FnMut(&mut S) -> Result<ChangedMeshes, Error>,
    ) -> Result<ChangedMeshes, Error> {
        let mut changes = ChangedMeshes::new();
        self.for_each_active(|scheme| {
            changes.extend(phase(scheme)?);
            Ok(())
        })?;
        changes.sort_unstable();
        changes.dedup();
        Ok(changes)
    }
}

impl<S: CouplingScheme> CouplingScheme for CompositionalScheme<S> {
    fn initialize(&mut self, start_time: f64, start_window: usize) -> Result<(), Error> {
        if self.schemes.is_empty() {
            return Err(Error::EmptyComposition);
        }
        for scheme in &mut self.schemes {
            scheme.initialize(start_time, start_window)?;
        }
        self.update_finished();
        debug!(
            schemes = self.schemes.len(),
            implicit = ?self.implicit,
            "compositional scheme initialized"
        );
        Ok(())
    }

    fn initialize_data(&mut self) -> Result<(), Error> {
        for scheme in &mut self.schemes {
            scheme.initialize_data()?;
        }
        Ok(())
    }

    fn add_computed_time(&mut self, dt: f64) -> Result<(), Error> {
        self.for_each_active(|scheme| scheme.add_computed_time(dt))?;
        if self.running_implicit().is_some() {
            self.trailing_time += dt;
        }
        Ok(())
    }

    fn first_synchronization(&mut self, local_changes: &[MeshId]) -> Result<ChangedMeshes, Error> {
        self.collect_changes(|scheme| scheme.first_synchronization(local_changes))
    }

    fn first_exchange(&mut self) -> Result<(), Error> {
        self.for_each_active(S::first_exchange)
    }

    fn second_synchronization(&mut self) -> Result<ChangedMeshes, Error> {
        self.collect_changes(S::second_synchronization)
    }

    fn second_exchange(&mut self) -> Result<(), Error> {
        self.for_each_active(S::second_exchange)?;

        if let Some(implicit) = self.running_implicit() {
            let scheme = &self.schemes[implicit];
            if scheme.is_time_window_complete() {
                self.advance_trailing(implicit)?;
                self.iterating = false;
            } else if scheme.is_action_required(Action::ReadCheckpoint) {
                debug!(iteration = scheme.iterations(), "implicit scheme repeats window");
                self.iterating = true;
                self.trailing_time = 0.0;
            }
        }
        self.update_finished();
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), Error> {
        for scheme in &mut self.schemes {
            scheme.finalize()?;
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        !self.schemes.is_empty() && self.schemes.iter().all(S::is_initialized)
    }

    fn is_coupling_ongoing(&self) -> bool {
        self.schemes.iter().any(S::is_coupling_ongoing)
    }

    fn is_time_window_complete(&self) -> bool {
        self.schemes.iter().all(S::is_time_window_complete)
    }

    /// The earliest time of the schemes still running.
    fn time(&self) -> f64 {
        self.running_schemes()
            .map(S::time)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    fn time_windows(&self) -> usize {
        self.running_schemes()
            .map(S::time_windows)
            .min()
            .unwrap_or(0)
    }

    fn time_window_size(&self) -> Option<f64> {
        self.running_schemes()
            .filter_map(S::time_window_size)
            .reduce(f64::min)
    }

    fn this_time_window_remainder(&self) -> f64 {
        self.active_schemes()
            .map(S::this_time_window_remainder)
            .fold(0.0, f64::max)
    }

    fn next_time_step_max_length(&self) -> Option<f64> {
        self.active_schemes()
            .filter_map(S::next_time_step_max_length)
            .reduce(f64::min)
    }

    fn will_data_be_exchanged(&self, last_dt: f64) -> bool {
        self.active_schemes()
            .any(|scheme| scheme.will_data_be_exchanged(last_dt))
    }

    fn has_data_been_received(&self) -> bool {
        self.active_schemes().any(S::has_data_been_received)
    }

    fn is_implicit(&self) -> bool {
        self.implicit.is_some()
    }

    fn has_converged(&self) -> bool {
        self.implicit
            .is_none_or(|implicit| self.schemes[implicit].has_converged())
    }

    fn iterations(&self) -> usize {
        self.implicit
            .map_or(1, |implicit| self.schemes[implicit].iterations())
    }

    fn is_action_required(&self, action: Action) -> bool {
        self.schemes
            .iter()
            .any(|scheme| scheme.is_action_required(action))
    }

    fn is_action_fulfilled(&self, action: Action) -> bool {
        self.schemes
            .iter()
            .any(|scheme| scheme.is_action_fulfilled(action))
    }

    fn mark_action_fulfilled(&mut self, action: Action) -> Result<(), Error> {
        let mut fulfilled = false;
        for scheme in &mut self.schemes {
            if scheme.is_action_required(action) {
                scheme.mark_action_fulfilled(action)?;
                fulfilled = true;
            }
        }
        if fulfilled {
            Ok(())
        } else {
            Err(Error::ActionNotRequired(action))
        }
    }

    fn require_action(&mut self, action: Action) {
        for index in 0..self.schemes.len() {
            if self.is_active(index) {
                self.schemes[index].require_action(action);
            }
        }
    }

    fn sends_initialized_data(&self) -> bool {
        self.schemes.iter().any(S::sends_initialized_data)
    }

    fn read_data(&self, data: DataId, relative_dt: f64) -> Result<Array1<f64>, Error> {
        self.schemes
            .iter()
            .find(|scheme| scheme.couples(data))
            .ok_or(Error::UnknownData(data))?
            .read_data(data, relative_dt)
    }

    fn couples(&self, data: DataId) -> bool {
        self.schemes.iter().any(|scheme| scheme.couples(data))
    }

    fn coupling_partners(&self) -> Vec<String> {
        let mut partners: Vec<String> = Vec::new();
        for partner in self.schemes.iter().flat_map(S::coupling_partners) {
            if !partners.contains(&partner) {
                partners.push(partner);
            }
        }
        partners
    }

    fn print_coupling_state(&self) -> String {
        self.schemes
            .iter()
            .map(S::print_coupling_state)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn send_state(&self, channel: &mut dyn StateChannel, rank: usize) -> Result<(), Error> {
        for scheme in &self.schemes {
            scheme.send_state(channel, rank)?;
        }
        Ok(())
    }

    fn receive_state(
        &mut self,
        channel: &mut dyn StateChannel,
        rank: usize,
    ) -> Result<(), Error> {
        for scheme in &mut self.schemes {
            scheme.receive_state(channel, rank)?;
        }
        self.update_finished();
        Ok(())
    }

    fn is_compositional(&self) -> bool {
        true
    }
}
