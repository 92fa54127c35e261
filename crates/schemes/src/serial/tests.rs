use super::*;

use std::cell::RefCell;

use approx::assert_relative_eq;
use indexmap::IndexMap;
use lockstep_core::{AccelerationError, Action, DataMap};
use lockstep_plugins::convergence::MinIterationConvergence;
use ndarray::Array1;

use crate::test_utils::{Fixture, Message, ScriptedChannel, explicit, implicit};

struct Setup {
    scheme: SerialScheme,
    channel: ScriptedChannel,
    send: Rc<Field>,
    receive: Rc<Field>,
}

/// Local participant "A" or "B" of a serial A-B scheme; data 0 flows from A
/// to B and data 1 back.
fn setup(config: Config, local: &str) -> Setup {
    let fixture = Fixture::new();
    let channel = ScriptedChannel::default();
    let mut scheme = SerialScheme::new(
        config,
        Participants::new("A", "B", local),
        Box::new(channel.clone()),
    )
    .expect("valid scheme");

    let (send_id, receive_id) = if local == "A" { (0, 1) } else { (1, 0) };
    let send = fixture.field(send_id, 1.0);
    let receive = fixture.field(receive_id, 0.0);
    scheme
        .add_data_to_send(Rc::clone(&send), &fixture.mesh, false)
        .expect("send data");
    scheme
        .add_data_to_receive(Rc::clone(&receive), &fixture.mesh, false)
        .expect("receive data");
    Setup {
        scheme,
        channel,
        send,
        receive,
    }
}

fn fulfil_checkpoints(scheme: &mut SerialScheme) {
    for action in [Action::WriteCheckpoint, Action::ReadCheckpoint] {
        if scheme.is_action_required(action) {
            scheme
                .mark_action_fulfilled(action)
                .expect("required action");
        }
    }
}

#[test]
fn explicit_first_participant_advances_once_per_window() {
    let Setup {
        mut scheme,
        channel,
        receive,
        ..
    } = setup(explicit(0.1, 1.0), "A");
    for window in 0..10 {
        channel.push_values(DataId(1), &[f64::from(window)]);
    }
    scheme.initialize(0.0, 1).expect("initialize");

    let mut advances = 0;
    while scheme.is_coupling_ongoing() {
        let dt = scheme.next_time_step_max_length().expect("bounded step");
        scheme.add_computed_time(dt).expect("valid step");
        scheme.advance().expect("advance");
        assert!(scheme.is_time_window_complete());
        advances += 1;
    }

    assert_eq!(advances, 10);
    assert_eq!(scheme.time_windows(), 11);
    assert_relative_eq!(scheme.time(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(receive.values()[0], 9.0);
    assert_eq!(channel.pending(), 0);
    assert_eq!(channel.take_sent().len(), 10);
    scheme.finalize().expect("finalize");
    assert!(!scheme.is_initialized());
}

#[test]
fn subcycling_exchanges_only_at_window_end() {
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(explicit(0.1, 0.1), "A");
    channel.push_values(DataId(1), &[2.0]);
    scheme.initialize(0.0, 1).expect("initialize");

    for step in 1..=4 {
        assert_eq!(scheme.will_data_be_exchanged(0.025), step == 4);
        scheme.add_computed_time(0.025).expect("valid step");
        scheme.advance().expect("advance");
        assert_eq!(scheme.is_time_window_complete(), step == 4);
        let sent = channel.take_sent();
        assert_eq!(sent.len(), usize::from(step == 4));
    }
    assert!(scheme.has_data_been_received());
    assert!(!scheme.is_coupling_ongoing());
}

#[test]
fn interior_steps_are_stored_in_the_waveform() {
    let mut config = explicit(1.0, 1.0);
    config.interpolation_order = 1;
    let Setup {
        mut scheme,
        channel,
        send,
        ..
    } = setup(config, "A");
    channel.push_values(DataId(1), &[0.0]);
    scheme.initialize(0.0, 1).expect("initialize");

    send.write(Array1::from_elem(1, 3.0)).expect("write");
    scheme.add_computed_time(0.5).expect("valid step");
    scheme.advance().expect("advance");

    let stored = scheme.base.data()[&DataId(0)].storage().times();
    assert_eq!(stored.len(), 2);
    assert_relative_eq!(stored[1], 0.5);
}

#[test]
fn explicit_second_participant_receives_during_initialize() {
    let Setup {
        mut scheme,
        channel,
        receive,
        ..
    } = setup(explicit(0.5, 1.0), "B");
    channel.push_values(DataId(0), &[4.0]);
    channel.push_values(DataId(0), &[5.0]);

    scheme.initialize(0.0, 1).expect("initialize");
    assert_relative_eq!(receive.values()[0], 4.0);
    assert!(scheme.has_data_been_received());

    scheme.add_computed_time(0.5).expect("valid step");
    scheme.advance().expect("advance");
    assert_relative_eq!(receive.values()[0], 5.0);

    scheme.add_computed_time(0.5).expect("valid step");
    scheme.advance().expect("advance");
    assert!(!scheme.is_coupling_ongoing());
    assert_eq!(
        channel.take_sent(),
        vec![
            Message::Values(DataId(1), vec![1.0]),
            Message::Values(DataId(1), vec![1.0]),
        ]
    );
}

#[test]
fn implicit_second_participant_iterates_each_window() {
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(implicit(1.0, 3, 10), "B");
    scheme
        .add_convergence_measure(
            DataId(1),
            false,
            MinIterationConvergence::new(3).expect("valid measure"),
        )
        .expect("measure");
    for _ in 0..9 {
        channel.push_values(DataId(0), &[1.0]);
    }
    scheme.initialize(0.0, 1).expect("initialize");
    assert!(scheme.is_action_required(Action::WriteCheckpoint));

    let mut advances = 0;
    while scheme.is_coupling_ongoing() {
        fulfil_checkpoints(&mut scheme);
        scheme.add_computed_time(1.0).expect("valid step");
        scheme.advance().expect("advance");
        advances += 1;
        if scheme.is_time_window_complete() {
            assert!(scheme.has_converged());
        } else {
            assert!(scheme.is_action_required(Action::ReadCheckpoint));
            assert_relative_eq!(scheme.this_time_window_remainder(), 1.0);
        }
    }

    assert_eq!(advances, 9);
    let iterations: Vec<_> = scheme.window_reports().iter().map(|r| r.iterations).collect();
    assert_eq!(iterations, vec![3, 3, 3]);
    assert_eq!(scheme.total_iterations(), 9);
    assert_eq!(channel.pending(), 0);

    let flags: Vec<_> = channel
        .take_sent()
        .into_iter()
        .filter_map(|message| match message {
            Message::Flag(flag) => Some(flag),
            _ => None,
        })
        .collect();
    assert_eq!(
        flags,
        vec![false, false, true, false, false, true, false, false, true]
    );
}

#[test]
fn implicit_first_participant_follows_the_flag() {
    let Setup {
        mut scheme,
        channel,
        receive,
        ..
    } = setup(implicit(1.0, 1, 10), "A");
    channel.push(Message::Flag(false));
    channel.push_values(DataId(1), &[2.0]);
    channel.push(Message::Flag(true));
    channel.push_values(DataId(1), &[3.0]);
    scheme.initialize(0.0, 1).expect("initialize");

    fulfil_checkpoints(&mut scheme);
    scheme.add_computed_time(1.0).expect("valid step");
    scheme.advance().expect("advance");
    assert!(!scheme.is_time_window_complete());
    assert_eq!(scheme.iterations(), 2);
    assert_relative_eq!(receive.values()[0], 2.0);

    fulfil_checkpoints(&mut scheme);
    scheme.add_computed_time(1.0).expect("valid step");
    scheme.advance().expect("advance");
    assert!(scheme.is_time_window_complete());
    assert!(!scheme.is_coupling_ongoing());
    assert!(!scheme.is_action_required(Action::WriteCheckpoint));
    assert_relative_eq!(receive.values()[0], 3.0);
}

#[test]
fn first_participant_decides_the_window_size() {
    let config = Config {
        max_time: Some(1.0),
        time_window_size: TimeWindowSize::FirstParticipant,
        ..Config::default()
    };
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(config.clone(), "A");
    channel.push_values(DataId(1), &[0.0]);
    scheme.initialize(0.0, 1).expect("initialize");
    assert!(!scheme.has_time_window_size());
    assert_eq!(scheme.next_time_step_max_length(), Some(1.0));

    scheme.add_computed_time(0.3).expect("valid step");
    scheme.advance().expect("advance");
    assert_eq!(
        channel.take_sent(),
        vec![Message::Scalar(0.3), Message::Values(DataId(0), vec![1.0])]
    );

    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(config, "B");
    channel.push(Message::Scalar(0.3));
    channel.push_values(DataId(0), &[0.0]);
    scheme.initialize(0.0, 1).expect("initialize");
    assert_eq!(scheme.time_window_size(), Some(0.3));
    assert!(matches!(
        scheme.add_computed_time(0.4),
        Err(Error::TimeStepExceedsWindow { .. })
    ));
}

#[test]
fn invalid_received_window_size_is_rejected() {
    let config = Config {
        max_time: Some(1.0),
        time_window_size: TimeWindowSize::FirstParticipant,
        ..Config::default()
    };
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(config, "B");
    channel.push(Message::Scalar(0.0));
    assert!(matches!(
        scheme.initialize(0.0, 1),
        Err(Error::InvalidWindowSize(_))
    ));
}

#[test]
fn second_participant_sends_initial_data() {
    let fixture = Fixture::new();
    let channel = ScriptedChannel::default();
    let mut scheme = SerialScheme::new(
        explicit(1.0, 1.0),
        Participants::new("A", "B", "B"),
        Box::new(channel.clone()),
    )
    .expect("valid scheme");
    let send = fixture.field(1, 0.0);
    let receive = fixture.field(0, 0.0);
    scheme
        .add_data_to_send(Rc::clone(&send), &fixture.mesh, true)
        .expect("send data");
    scheme
        .add_data_to_receive(Rc::clone(&receive), &fixture.mesh, false)
        .expect("receive data");

    scheme.initialize(0.0, 1).expect("initialize");
    assert!(scheme.sends_initialized_data());
    assert!(matches!(
        scheme.advance(),
        Err(Error::InitialDataPending)
    ));
    assert!(matches!(
        scheme.initialize_data(),
        Err(Error::UnfulfilledActions(_))
    ));

    send.write(Array1::from_elem(1, 7.0)).expect("write");
    scheme
        .mark_action_fulfilled(Action::InitializeInitialData)
        .expect("required");
    channel.push_values(DataId(0), &[5.0]);
    scheme.initialize_data().expect("initial data");

    assert_eq!(channel.take_sent(), vec![Message::Values(DataId(1), vec![7.0])]);
    assert_relative_eq!(receive.values()[0], 5.0);
    assert!(matches!(
        scheme.initialize_data(),
        Err(Error::InitializeDataTwice)
    ));
}

#[test]
fn first_participant_cannot_send_initial_data() {
    let fixture = Fixture::new();
    let mut scheme = SerialScheme::new(
        explicit(1.0, 1.0),
        Participants::new("A", "B", "A"),
        Box::new(ScriptedChannel::default()),
    )
    .expect("valid scheme");
    let result = scheme.add_data_to_send(fixture.field(0, 0.0), &fixture.mesh, true);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::FirstParticipantInitialData))
    ));
}

#[test]
fn misuse_is_reported() {
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(implicit(1.0, 1, 5), "A");
    assert!(matches!(scheme.advance(), Err(Error::NotInitialized)));
    assert!(matches!(
        scheme.add_computed_time(0.5),
        Err(Error::NotInitialized)
    ));

    scheme.initialize(0.0, 1).expect("initialize");
    assert!(matches!(
        scheme.initialize(0.0, 1),
        Err(Error::AlreadyInitialized)
    ));
    assert!(matches!(
        scheme.add_computed_time(1.5),
        Err(Error::TimeStepExceedsWindow { .. })
    ));
    assert!(matches!(
        scheme.add_computed_time(-0.1),
        Err(Error::InvalidTimeStep(_))
    ));
    assert!(matches!(
        scheme.second_exchange(),
        Err(Error::PhaseOrder("second_exchange"))
    ));
    assert!(matches!(
        scheme.advance(),
        Err(Error::UnfulfilledActions(actions)) if actions.contains(Action::WriteCheckpoint)
    ));
    assert!(matches!(
        scheme.mark_action_fulfilled(Action::ReadCheckpoint),
        Err(Error::ActionNotRequired(Action::ReadCheckpoint))
    ));
    assert!(matches!(scheme.finalize(), Err(Error::StillOngoing)));

    // Nothing requires initialization: a logged no-op.
    scheme.initialize_data().expect("no-op");
    assert_eq!(channel.take_sent(), vec![]);
}

#[derive(Default)]
struct Recorder {
    calls: Rc<RefCell<Vec<&'static str>>>,
    ids: Vec<DataId>,
}

impl Acceleration for Recorder {
    fn data_ids(&self) -> &[DataId] {
        &self.ids
    }

    fn initialize(&mut self, _data: &DataMap) -> Result<(), AccelerationError> {
        self.calls.borrow_mut().push("initialize");
        Ok(())
    }

    fn design_specification(&self, _data: &DataMap) -> IndexMap<DataId, Array1<f64>> {
        self.calls.borrow_mut().push("design");
        IndexMap::new()
    }

    fn perform_acceleration(&mut self, _data: &mut DataMap) -> Result<(), AccelerationError> {
        self.calls.borrow_mut().push("perform");
        Ok(())
    }

    fn iterations_converged(&mut self, _data: &mut DataMap) -> Result<(), AccelerationError> {
        self.calls.borrow_mut().push("converged");
        Ok(())
    }
}

#[test]
fn acceleration_is_called_in_protocol_order() {
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(implicit(1.0, 1, 2), "B");
    let calls = Rc::new(RefCell::new(Vec::new()));
    scheme.set_acceleration(Recorder {
        calls: Rc::clone(&calls),
        ids: vec![DataId(1)],
    });
    channel.push_values(DataId(0), &[1.0]);
    channel.push_values(DataId(0), &[1.0]);
    scheme.initialize(0.0, 1).expect("initialize");

    while scheme.is_coupling_ongoing() {
        fulfil_checkpoints(&mut scheme);
        scheme.add_computed_time(1.0).expect("valid step");
        scheme.advance().expect("advance");
    }

    assert_eq!(
        *calls.borrow(),
        vec!["initialize", "design", "perform", "design", "converged"]
    );
    assert_eq!(scheme.window_reports()[0].iterations, 2);
}

#[test]
fn accelerating_received_data_is_rejected() {
    let Setup { mut scheme, .. } = setup(implicit(1.0, 1, 2), "B");
    scheme.set_acceleration(Recorder {
        ids: vec![DataId(0)],
        ..Recorder::default()
    });
    assert!(matches!(
        scheme.initialize(0.0, 1),
        Err(Error::Config(ConfigError::AcceleratedReceiveData))
    ));
}

#[test]
fn state_is_mirrored_between_ranks() {
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(explicit(0.5, 1.0), "A");
    channel.push_values(DataId(1), &[1.0]);
    scheme.initialize(0.0, 1).expect("initialize");
    scheme.add_computed_time(0.5).expect("valid step");
    scheme.advance().expect("advance");

    let mut wire = ScriptedChannel::default();
    scheme.send_state(&mut wire, 3).expect("send state");
    let Some(Message::State(rank, bytes)) = wire.take_sent().pop() else {
        panic!("state was not sent");
    };
    assert_eq!(rank, 3);
    wire.push(Message::State(3, bytes));

    let Setup { scheme: mut mirror, .. } = setup(explicit(0.5, 1.0), "A");
    mirror.receive_state(&mut wire, 3).expect("receive state");
    assert_eq!(mirror.state(), scheme.state());
    assert!(mirror.is_initialized());
    assert_eq!(mirror.time_windows(), 2);
    assert_relative_eq!(mirror.time(), 0.5);
}

#[test]
fn prints_a_diagnostic_line() {
    let Setup { mut scheme, .. } = setup(explicit(0.1, 1.0), "A");
    scheme.initialize(0.0, 1).expect("initialize");
    assert_eq!(
        scheme.print_coupling_state(),
        "tw 1 of - | t 0 of 1 | tw-size 0.1 | max-dt 0.1 | ongoing yes | tw-complete no"
    );

    let Setup { mut scheme, .. } = setup(implicit(1.0, 2, 4), "A");
    scheme.initialize(0.0, 1).expect("initialize");
    assert_eq!(
        scheme.print_coupling_state(),
        "it 1 of 4 | tw 1 of 2 | t 0 of - | tw-size 1 | max-dt 1 | ongoing yes | tw-complete no | write-iteration-checkpoint"
    );
}

#[test]
fn mesh_changes_are_exchanged_at_window_end() {
    let mut config = explicit(1.0, 1.0);
    config.mesh_synchronization = true;
    let Setup {
        mut scheme,
        channel,
        ..
    } = setup(config, "A");
    scheme.initialize(0.0, 1).expect("initialize");

    assert_eq!(scheme.first_synchronization(&[MeshId(2)]).expect("sync"), vec![]);
    scheme.add_computed_time(1.0).expect("valid step");
    channel.push(Message::Meshes(vec![MeshId(4)]));
    let remote = scheme.first_synchronization(&[MeshId(2)]).expect("sync");
    assert_eq!(remote, vec![MeshId(4)]);
    assert_eq!(channel.take_sent(), vec![Message::Meshes(vec![MeshId(2)])]);
    assert_eq!(scheme.second_synchronization().expect("sync"), vec![]);
}
