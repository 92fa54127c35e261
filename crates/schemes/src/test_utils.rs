//! Scripted collaborators for driving one side of a scheme in unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use lockstep_core::{Channel, ChannelError, DataId, Field, Mesh, MeshId, StateChannel};
use ndarray::{Array1, ArrayView1};

use crate::Config;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Message {
    Values(DataId, Vec<f64>),
    Flag(bool),
    Scalar(f64),
    Meshes(Vec<MeshId>),
    State(usize, Vec<u8>),
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Values(..) => "values",
            Message::Flag(_) => "flag",
            Message::Scalar(_) => "scalar",
            Message::Meshes(_) => "meshes",
            Message::State(..) => "state",
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    incoming: VecDeque<Message>,
    sent: Vec<Message>,
}

/// A channel replaying queued messages and recording everything sent.
///
/// Clones share the script, so a test keeps one handle while the scheme
/// owns another.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedChannel(Rc<RefCell<Script>>);

impl ScriptedChannel {
    pub(crate) fn push(&self, message: Message) {
        self.0.borrow_mut().incoming.push_back(message);
    }

    pub(crate) fn push_values(&self, data: DataId, values: &[f64]) {
        self.push(Message::Values(data, values.to_vec()));
    }

    pub(crate) fn take_sent(&self) -> Vec<Message> {
        std::mem::take(&mut self.0.borrow_mut().sent)
    }

    pub(crate) fn pending(&self) -> usize {
        self.0.borrow().incoming.len()
    }

    fn next(&self, expected: &'static str) -> Result<Message, ChannelError> {
        let message = self
            .0
            .borrow_mut()
            .incoming
            .pop_front()
            .ok_or(ChannelError::Disconnected)?;
        if message.kind() != expected {
            return Err(ChannelError::UnexpectedMessage {
                expected,
                found: message.kind(),
            });
        }
        Ok(message)
    }

    fn record(&self, message: Message) {
        self.0.borrow_mut().sent.push(message);
    }
}

impl Channel for ScriptedChannel {
    fn send_values(
        &mut self,
        data: DataId,
        _mesh: MeshId,
        values: ArrayView1<'_, f64>,
    ) -> Result<(), ChannelError> {
        self.record(Message::Values(data, values.to_vec()));
        Ok(())
    }

    fn receive_values(
        &mut self,
        data: DataId,
        _mesh: MeshId,
        len: usize,
    ) -> Result<Array1<f64>, ChannelError> {
        match self.next("values")? {
            Message::Values(found, _) if found != data => Err(ChannelError::WrongData {
                expected: data,
                found,
            }),
            Message::Values(_, values) if values.len() != len => Err(ChannelError::WrongLength {
                data,
                expected: len,
                found: values.len(),
            }),
            Message::Values(_, values) => Ok(Array1::from(values)),
            _ => Err(ChannelError::Disconnected),
        }
    }

    fn send_flag(&mut self, flag: bool) -> Result<(), ChannelError> {
        self.record(Message::Flag(flag));
        Ok(())
    }

    fn receive_flag(&mut self) -> Result<bool, ChannelError> {
        match self.next("flag")? {
            Message::Flag(flag) => Ok(flag),
            _ => Err(ChannelError::Disconnected),
        }
    }

    fn send_scalar(&mut self, value: f64) -> Result<(), ChannelError> {
        self.record(Message::Scalar(value));
        Ok(())
    }

    fn receive_scalar(&mut self) -> Result<f64, ChannelError> {
        match self.next("scalar")? {
            Message::Scalar(value) => Ok(value),
            _ => Err(ChannelError::Disconnected),
        }
    }

    fn send_mesh_ids(&mut self, meshes: &[MeshId]) -> Result<(), ChannelError> {
        self.record(Message::Meshes(meshes.to_vec()));
        Ok(())
    }

    fn receive_mesh_ids(&mut self) -> Result<Vec<MeshId>, ChannelError> {
        match self.next("meshes")? {
            Message::Meshes(meshes) => Ok(meshes),
            _ => Err(ChannelError::Disconnected),
        }
    }
}

impl StateChannel for ScriptedChannel {
    fn send_state(&mut self, rank: usize, state: &[u8]) -> Result<(), ChannelError> {
        self.record(Message::State(rank, state.to_vec()));
        Ok(())
    }

    fn receive_state(&mut self, rank: usize) -> Result<Vec<u8>, ChannelError> {
        match self.next("state")? {
            Message::State(found, _) if found != rank => Err(ChannelError::WrongRank {
                expected: rank,
                found,
            }),
            Message::State(_, bytes) => Ok(bytes),
            _ => Err(ChannelError::Disconnected),
        }
    }
}

/// A one-dimensional mesh with a single scalar field per id.
pub(crate) struct Fixture {
    pub(crate) mesh: Rc<Mesh>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            mesh: Rc::new(Mesh::new(MeshId(0), "interface", 1)),
        }
    }

    pub(crate) fn field(&self, id: usize, value: f64) -> Rc<Field> {
        Rc::new(Field::new(
            DataId(id),
            format!("field-{id}"),
            1,
            Array1::from_elem(1, value),
        ))
    }
}

pub(crate) fn explicit(window: f64, max_time: f64) -> Config {
    Config {
        max_time: Some(max_time),
        time_window_size: crate::TimeWindowSize::Fixed(window),
        ..Config::default()
    }
}

pub(crate) fn implicit(window: f64, max_time_windows: usize, max_iterations: usize) -> Config {
    Config {
        max_time_windows: Some(max_time_windows),
        time_window_size: crate::TimeWindowSize::Fixed(window),
        coupling_mode: crate::CouplingMode::Implicit,
        max_iterations: Some(max_iterations),
        ..Config::default()
    }
}
