//! Staggered coupling of two participants.
//!
//! The first participant computes a window with the second's data from the
//! previous window and sends its result; the second receives it, computes
//! the same window and answers. In implicit mode the second participant
//! measures convergence and accelerates.

use std::rc::Rc;

use lockstep_core::{
    Acceleration, Channel, ConvergenceMeasure, DataId, Direction, Field, Mesh, MeshId,
};

use crate::base::{BaseScheme, WindowSizeExchange, delegate_to_base};
use crate::{
    ChangedMeshes, Config, ConfigError, CouplingScheme, Error, Participants, Role, SchemeState,
    TimeWindowSize, WindowReport,
};

/// The only partner of a two-party scheme.
const PARTNER: usize = 0;

pub struct SerialScheme {
    base: BaseScheme,
    participants: Participants,
    role: Role,
    channel: Box<dyn Channel>,
}

impl SerialScheme {
    /// # Errors
    ///
    /// Fails if `config` is invalid or the local participant is not one of
    /// `participants`.
    pub fn new(
        config: Config,
        participants: Participants,
        channel: Box<dyn Channel>,
    ) -> Result<Self, Error> {
        let role = participants.role()?;
        let exchange = match (config.time_window_size, role) {
            (TimeWindowSize::FirstParticipant, Role::First) => WindowSizeExchange::Sends,
            (TimeWindowSize::FirstParticipant, Role::Second) => WindowSizeExchange::Receives,
            (TimeWindowSize::Fixed(_), _) => WindowSizeExchange::None,
        };
        let base = BaseScheme::new(config, exchange, role == Role::Second)?;
        Ok(Self {
            base,
            participants,
            role,
            channel,
        })
    }

    /// Couples `field` as written by the local participant.
    ///
    /// # Errors
    ///
    /// Fails after `initialize`, for duplicate data, or if the first
    /// participant asks to send initial data.
    pub fn add_data_to_send(
        &mut self,
        field: Rc<Field>,
        mesh: &Rc<Mesh>,
        requires_initialization: bool,
    ) -> Result<(), Error> {
        if requires_initialization && self.role == Role::First {
            return Err(ConfigError::FirstParticipantInitialData.into());
        }
        self.base
            .add_data(field, mesh, Direction::Send, PARTNER, requires_initialization)
    }

    /// Couples `field` as read by the local participant.
    ///
    /// # Errors
    ///
    /// Fails after `initialize` or for duplicate data.
    pub fn add_data_to_receive(
        &mut self,
        field: Rc<Field>,
        mesh: &Rc<Mesh>,
        requires_initialization: bool,
    ) -> Result<(), Error> {
        self.base.add_data(
            field,
            mesh,
            Direction::Receive,
            PARTNER,
            requires_initialization,
        )
    }

    /// Only the second participant evaluates measures.
    ///
    /// # Errors
    ///
    /// Fails after `initialize`.
    pub fn add_convergence_measure(
        &mut self,
        data: DataId,
        suffices: bool,
        measure: impl ConvergenceMeasure + 'static,
    ) -> Result<(), Error> {
        self.base.add_measure_boxed(data, suffices, Box::new(measure))
    }

    /// Only the second participant accelerates, and only data it sends.
    pub fn set_acceleration(&mut self, acceleration: impl Acceleration + 'static) {
        self.base.set_acceleration(Box::new(acceleration));
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.base.config()
    }

    #[must_use]
    pub fn total_iterations(&self) -> usize {
        self.base.total_iterations()
    }

    #[must_use]
    pub fn window_reports(&self) -> &[WindowReport] {
        self.base.window_reports()
    }

    #[must_use]
    pub fn state(&self) -> SchemeState {
        self.base.state()
    }

    pub fn apply_state(&mut self, state: &SchemeState) {
        self.base.apply_state(state);
    }

    fn receive_window_data(&mut self) -> Result<(), Error> {
        self.base.receive_window_size(&mut *self.channel)?;
        self.base.receive_data(&mut *self.channel, PARTNER)
    }
}

impl CouplingScheme for SerialScheme {
    delegate_to_base!();

    fn initialize(&mut self, start_time: f64, start_window: usize) -> Result<(), Error> {
        if self.role == Role::Second {
            let received = self.base.accelerated_ids().into_iter().any(|id| {
                self.base
                    .data()
                    .get(&id)
                    .is_some_and(|data| data.direction() == Direction::Receive)
            });
            if received {
                return Err(ConfigError::AcceleratedReceiveData.into());
            }
        }
        self.base.initialize(start_time, start_window)?;

        // Without initial data to send, the second participant starts by
        // waiting for the first window.
        if self.role == Role::Second
            && !self.base.sends_initialized_data()
            && self.base.is_coupling_ongoing()
        {
            self.receive_window_data()?;
        }
        Ok(())
    }

    fn initialize_data(&mut self) -> Result<(), Error> {
        if !self.base.begin_initialize_data()? {
            return Ok(());
        }
        match self.role {
            Role::First => {
                self.base
                    .receive_initial_data(&mut *self.channel, PARTNER)?;
            }
            Role::Second => {
                self.base.send_initial_data(&mut *self.channel, PARTNER)?;
                if self.base.is_coupling_ongoing() {
                    self.receive_window_data()?;
                }
            }
        }
        self.base.finish_initialize_data();
        Ok(())
    }

    fn first_synchronization(&mut self, local_changes: &[MeshId]) -> Result<ChangedMeshes, Error> {
        if !self.base.synchronizes_meshes() {
            return Ok(ChangedMeshes::new());
        }
        let channel = &mut *self.channel;
        match self.role {
            Role::First => {
                self.base.send_changed_meshes(channel, local_changes)?;
                self.base.receive_changed_meshes(channel)
            }
            Role::Second => {
                let remote = self.base.receive_changed_meshes(channel)?;
                self.base.send_changed_meshes(channel, local_changes)?;
                Ok(remote)
            }
        }
    }

    fn first_exchange(&mut self) -> Result<(), Error> {
        self.base.begin_advance()?;
        if !self.base.reached_end_of_window() {
            return Ok(());
        }
        self.base.store_window_end()?;

        let channel = &mut *self.channel;
        match self.role {
            Role::First => {
                self.base.send_window_size(channel)?;
                self.base.send_data(channel, PARTNER)?;
            }
            Role::Second => {
                if self.base.is_implicit() {
                    self.base.implicit_step()?;
                    self.base.send_convergence(channel)?;
                }
                self.base.send_data(channel, PARTNER)?;
            }
        }
        Ok(())
    }

    fn second_synchronization(&mut self) -> Result<ChangedMeshes, Error> {
        Ok(ChangedMeshes::new())
    }

    fn second_exchange(&mut self) -> Result<(), Error> {
        self.base.begin_second_exchange()?;
        if !self.base.reached_end_of_window() {
            return Ok(());
        }

        match (self.role, self.base.is_implicit()) {
            (Role::First, false) => {
                self.base.receive_data(&mut *self.channel, PARTNER)?;
                self.base.move_to_next_window()?;
                self.base.finish_iteration();
            }
            (Role::First, true) => {
                self.base.receive_convergence(&mut *self.channel)?;
                if self.base.has_converged() {
                    self.base.move_to_next_window()?;
                }
                self.base.receive_data(&mut *self.channel, PARTNER)?;
                self.base.finish_iteration();
            }
            (Role::Second, false) => {
                self.base.move_to_next_window()?;
                self.base.finish_iteration();
                if self.base.is_coupling_ongoing() {
                    self.receive_window_data()?;
                }
            }
            (Role::Second, true) => {
                let retry = !self.base.has_converged();
                self.base.finish_iteration();
                if retry || self.base.is_coupling_ongoing() {
                    self.receive_window_data()?;
                }
            }
        }
        Ok(())
    }

    fn coupling_partners(&self) -> Vec<String> {
        vec![self.participants.remote().to_owned()]
    }
}

#[cfg(test)]
mod tests;
