use std::sync::mpsc::{self, Receiver, Sender};

use lockstep_core::{Channel, ChannelError, DataId, MeshId, StateChannel};
use ndarray::{Array1, ArrayView1};
use tracing::trace;

#[derive(Debug)]
enum Packet {
    Values {
        data: DataId,
        mesh: MeshId,
        values: Vec<f64>,
    },
    Flag(bool),
    Scalar(f64),
    Meshes(Vec<MeshId>),
    State {
        rank: usize,
        bytes: Vec<u8>,
    },
}

impl Packet {
    fn kind(&self) -> &'static str {
        match self {
            Packet::Values { .. } => "values",
            Packet::Flag(_) => "flag",
            Packet::Scalar(_) => "scalar",
            Packet::Meshes(_) => "mesh ids",
            Packet::State { .. } => "state",
        }
    }
}

/// One end of an in-process channel between two participants.
///
/// Sends never block; receives block until the other end has sent. Every
/// receive checks that the next message has the expected kind, data, mesh
/// and length. Both ends are `Send`, so participants can run on separate
/// threads.
#[derive(Debug)]
pub struct MemoryChannel {
    outgoing: Sender<Packet>,
    incoming: Receiver<Packet>,
}

impl MemoryChannel {
    /// Creates two connected ends.
    #[must_use]
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            MemoryChannel {
                outgoing: a_tx,
                incoming: a_rx,
            },
            MemoryChannel {
                outgoing: b_tx,
                incoming: b_rx,
            },
        )
    }

    fn send(&self, packet: Packet) -> Result<(), ChannelError> {
        trace!(kind = packet.kind(), "memory channel send");
        self.outgoing
            .send(packet)
            .map_err(|_| ChannelError::Disconnected)
    }

    fn receive(&self) -> Result<Packet, ChannelError> {
        let packet = self
            .incoming
            .recv()
            .map_err(|_| ChannelError::Disconnected)?;
        trace!(kind = packet.kind(), "memory channel receive");
        Ok(packet)
    }
}

impl Channel for MemoryChannel {
    fn send_values(
        &mut self,
        data: DataId,
        mesh: MeshId,
        values: ArrayView1<'_, f64>,
    ) -> Result<(), ChannelError> {
        self.send(Packet::Values {
            data,
            mesh,
            values: values.to_vec(),
        })
    }

    fn receive_values(
        &mut self,
        data: DataId,
        mesh: MeshId,
        len: usize,
    ) -> Result<Array1<f64>, ChannelError> {
        match self.receive()? {
            Packet::Values {
                data: found,
                mesh: found_mesh,
                values,
            } => {
                if found != data {
                    return Err(ChannelError::WrongData {
                        expected: data,
                        found,
                    });
                }
                if found_mesh != mesh {
                    return Err(ChannelError::WrongMesh {
                        expected: mesh,
                        found: found_mesh,
                    });
                }
                if values.len() != len {
                    return Err(ChannelError::WrongLength {
                        data,
                        expected: len,
                        found: values.len(),
                    });
                }
                Ok(Array1::from(values))
            }
            other => Err(unexpected("values", &other)),
        }
    }

    fn send_flag(&mut self, flag: bool) -> Result<(), ChannelError> {
        self.send(Packet::Flag(flag))
    }

    fn receive_flag(&mut self) -> Result<bool, ChannelError> {
        match self.receive()? {
            Packet::Flag(flag) => Ok(flag),
            other => Err(unexpected("flag", &other)),
        }
    }

    fn send_scalar(&mut self, value: f64) -> Result<(), ChannelError> {
        self.send(Packet::Scalar(value))
    }

    fn receive_scalar(&mut self) -> Result<f64, ChannelError> {
        match self.receive()? {
            Packet::Scalar(value) => Ok(value),
            other => Err(unexpected("scalar", &other)),
        }
    }

    fn send_mesh_ids(&mut self, meshes: &[MeshId]) -> Result<(), ChannelError> {
        self.send(Packet::Meshes(meshes.to_vec()))
    }

    fn receive_mesh_ids(&mut self) -> Result<Vec<MeshId>, ChannelError> {
        match self.receive()? {
            Packet::Meshes(meshes) => Ok(meshes),
            other => Err(unexpected("mesh ids", &other)),
        }
    }
}

impl StateChannel for MemoryChannel {
    fn send_state(&mut self, rank: usize, state: &[u8]) -> Result<(), ChannelError> {
        self.send(Packet::State {
            rank,
            bytes: state.to_vec(),
        })
    }

    fn receive_state(&mut self, rank: usize) -> Result<Vec<u8>, ChannelError> {
        match self.receive()? {
            Packet::State { rank: found, bytes } if found == rank => Ok(bytes),
            Packet::State { rank: found, .. } => Err(ChannelError::WrongRank {
                expected: rank,
                found,
            }),
            other => Err(unexpected("state", &other)),
        }
    }
}

fn unexpected(expected: &'static str, found: &Packet) -> ChannelError {
    ChannelError::UnexpectedMessage {
        expected,
        found: found.kind(),
    }
}
