//! Simultaneous coupling of two participants.
//!
//! Both participants compute the same window and exchange at its end. The
//! second participant receives first, so it can measure convergence and
//! accelerate over both directions of data before answering.

use std::rc::Rc;

use lockstep_core::{Acceleration, Channel, ConvergenceMeasure, DataId, Direction, Field, Mesh, MeshId};

use crate::base::{BaseScheme, WindowSizeExchange, delegate_to_base};
use crate::{
    ChangedMeshes, Config, ConfigError, CouplingScheme, Error, Participants, Role, SchemeState,
    TimeWindowSize, WindowReport,
};

const PARTNER: usize = 0;

pub struct ParallelScheme {
    base: BaseScheme,
    participants: Participants,
    role: Role,
    channel: Box<dyn Channel>,
}

impl ParallelScheme {
    /// # Errors
    ///
    /// Fails if `config` is invalid, asks the first participant to set the
    /// window size, or the local participant is not one of `participants`.
    pub fn new(
        config: Config,
        participants: Participants,
        channel: Box<dyn Channel>,
    ) -> Result<Self, Error> {
        if config.time_window_size == TimeWindowSize::FirstParticipant {
            return Err(ConfigError::FirstParticipantUnsupported("parallel").into());
        }
        let role = participants.role()?;
        let base = BaseScheme::new(config, WindowSizeExchange::None, role == Role::Second)?;
        Ok(Self {
            base,
            participants,
            role,
            channel,
        })
    }

    /// # Errors
    ///
    /// Fails after `initialize` or for duplicate data.
    pub fn add_data_to_send(
        &mut self,
        field: Rc<Field>,
        mesh: &Rc<Mesh>,
        requires_initialization: bool,
    ) -> Result<(), Error> {
        self.base
            .add_data(field, mesh, Direction::Send, PARTNER, requires_initialization)
    }

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

    /// The second participant may accelerate data in both directions.
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
}

impl CouplingScheme for ParallelScheme {
    delegate_to_base!();

    fn initialize(&mut self, start_time: f64, start_window: usize) -> Result<(), Error> {
        self.base.initialize(start_time, start_window)
    }

    fn initialize_data(&mut self) -> Result<(), Error> {
        if !self.base.begin_initialize_data()? {
            return Ok(());
        }
        let channel = &mut *self.channel;
        match self.role {
            Role::First => {
                self.base.send_initial_data(channel, PARTNER)?;
                self.base.receive_initial_data(channel, PARTNER)?;
            }
            Role::Second => {
                self.base.receive_initial_data(channel, PARTNER)?;
                self.base.send_initial_data(channel, PARTNER)?;
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
            Role::First => self.base.send_data(channel, PARTNER)?,
            Role::Second => {
                self.base.receive_data(channel, PARTNER)?;
                if self.base.is_implicit() {
                    self.base.implicit_step()?;
                }
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

        let channel = &mut *self.channel;
        let implicit = self.base.is_implicit();
        match self.role {
            Role::First => {
                if implicit {
                    self.base.receive_convergence(channel)?;
                    if self.base.has_converged() {
                        self.base.move_to_next_window()?;
                    }
                    self.base.receive_data(channel, PARTNER)?;
                } else {
                    self.base.receive_data(channel, PARTNER)?;
                    self.base.move_to_next_window()?;
                }
            }
            Role::Second => {
                if implicit {
                    self.base.send_convergence(channel)?;
                }
                self.base.send_data(channel, PARTNER)?;
                if !implicit {
                    self.base.move_to_next_window()?;
                }
            }
        }
        self.base.finish_iteration();
        Ok(())
    }

    fn coupling_partners(&self) -> Vec<String> {
        vec![self.participants.remote().to_owned()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use lockstep_core::Action;
    use lockstep_plugins::ConstantRelaxation;
    use lockstep_plugins::convergence::AbsoluteConvergence;
    use ndarray::Array1;

    use crate::test_utils::{Fixture, Message, ScriptedChannel, explicit, implicit};

    fn scheme(config: Config, local: &str) -> (ParallelScheme, ScriptedChannel, Rc<Field>, Rc<Field>) {
        let fixture = Fixture::new();
        let channel = ScriptedChannel::default();
        let mut scheme = ParallelScheme::new(
            config,
            Participants::new("A", "B", local),
            Box::new(channel.clone()),
        )
        .expect("valid scheme");
        let (send_id, receive_id) = if local == "A" { (0, 1) } else { (1, 0) };
        let send = fixture.field(send_id, 1.0);
        let receive = fixture.field(receive_id, 0.0);
        scheme
            .add_data_to_send(Rc::clone(&send), &fixture.mesh, true)
            .expect("send data");
        scheme
            .add_data_to_receive(Rc::clone(&receive), &fixture.mesh, true)
            .expect("receive data");
        (scheme, channel, send, receive)
    }

    #[test]
    fn first_participant_cannot_set_window_size() {
        let config = Config {
            time_window_size: TimeWindowSize::FirstParticipant,
            ..Config::default()
        };
        let result = ParallelScheme::new(
            config,
            Participants::new("A", "B", "A"),
            Box::new(ScriptedChannel::default()),
        );
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::FirstParticipantUnsupported(_)))
        ));
    }

    #[test]
    fn explicit_first_participant_sends_then_receives() {
        let (mut scheme, channel, send, receive) = scheme(explicit(0.5, 1.0), "A");
        scheme.initialize(0.0, 1).expect("initialize");
        scheme
            .mark_action_fulfilled(Action::InitializeInitialData)
            .expect("required");
        channel.push_values(DataId(1), &[2.0]);
        scheme.initialize_data().expect("initial data");
        assert_relative_eq!(receive.values()[0], 2.0);

        for value in [3.0, 4.0] {
            send.write(Array1::from_elem(1, value + 10.0)).expect("write");
            channel.push_values(DataId(1), &[value]);
            scheme.add_computed_time(0.5).expect("valid step");
            scheme.advance().expect("advance");
            assert_relative_eq!(receive.values()[0], value);
        }

        assert!(!scheme.is_coupling_ongoing());
        assert_eq!(
            channel.take_sent(),
            vec![
                Message::Values(DataId(0), vec![1.0]),
                Message::Values(DataId(0), vec![13.0]),
                Message::Values(DataId(0), vec![14.0]),
            ]
        );
    }

    #[test]
    fn implicit_second_participant_relaxes_and_converges() {
        let (mut scheme, channel, send, _receive) = scheme(implicit(1.0, 1, 20), "B");
        scheme
            .add_convergence_measure(
                DataId(0),
                false,
                AbsoluteConvergence::new(1e-3).expect("valid measure"),
            )
            .expect("measure");
        scheme.set_acceleration(ConstantRelaxation::new(0.5, vec![DataId(1)]).expect("omega"));
        scheme.initialize(0.0, 1).expect("initialize");
        assert!(scheme.is_action_required(Action::InitializeInitialData));
        scheme
            .mark_action_fulfilled(Action::InitializeInitialData)
            .expect("required");
        channel.push_values(DataId(0), &[0.0]);
        scheme.initialize_data().expect("initial data");
        channel.take_sent();

        // The partner answers 1.0 twice: the second answer has converged.
        let mut sent_values = Vec::new();
        for _ in 0..2 {
            for action in [Action::WriteCheckpoint, Action::ReadCheckpoint] {
                if scheme.is_action_required(action) {
                    scheme.mark_action_fulfilled(action).expect("required");
                }
            }
            send.write(Array1::from_elem(1, 4.0)).expect("write");
            channel.push_values(DataId(0), &[1.0]);
            scheme.add_computed_time(1.0).expect("valid step");
            scheme.advance().expect("advance");
            for message in channel.take_sent() {
                if let Message::Values(_, values) = message {
                    sent_values.push(values[0]);
                }
            }
        }

        // Relaxed against the previous iterate: 0.5 * 4 + 0.5 * 1, then a
        // converged (unrelaxed) 4.
        assert_eq!(sent_values.len(), 2);
        assert_relative_eq!(sent_values[0], 2.5);
        assert_relative_eq!(sent_values[1], 4.0);
        assert_eq!(scheme.window_reports()[0].iterations, 2);
        assert!(!scheme.is_coupling_ongoing());
    }

    #[test]
    fn implicit_first_participant_retries_until_flagged() {
        let (mut scheme, channel, _send, receive) = scheme(implicit(1.0, 2, 20), "A");
        scheme.initialize(0.0, 1).expect("initialize");
        scheme
            .mark_action_fulfilled(Action::InitializeInitialData)
            .expect("required");
        channel.push_values(DataId(1), &[0.0]);
        scheme.initialize_data().expect("initial data");
        channel.take_sent();

        channel.push(Message::Flag(false));
        channel.push_values(DataId(1), &[1.0]);
        channel.push(Message::Flag(true));
        channel.push_values(DataId(1), &[2.0]);

        scheme
            .mark_action_fulfilled(Action::WriteCheckpoint)
            .expect("required");
        scheme.add_computed_time(1.0).expect("valid step");
        scheme.advance().expect("advance");
        assert!(scheme.is_action_required(Action::ReadCheckpoint));
        assert_relative_eq!(scheme.time(), 0.0);

        scheme
            .mark_action_fulfilled(Action::ReadCheckpoint)
            .expect("required");
        scheme.add_computed_time(1.0).expect("valid step");
        scheme.advance().expect("advance");
        assert!(scheme.is_time_window_complete());
        assert!(scheme.is_action_required(Action::WriteCheckpoint));
        assert_relative_eq!(receive.values()[0], 2.0);
        assert_eq!(scheme.time_windows(), 2);
    }
}
