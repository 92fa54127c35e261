//! Core types for the lockstep coupling engine.
//!
//! This crate defines what coupling schemes build on:
//!
//! - [`Tolerance`] — the single epsilon policy for time comparisons
//! - [`Action`], [`Actions`], [`ActionLedger`] — the checkpoint action protocol
//! - [`time`] — [`Storage`], [`Waveform`] and [`WindowGrid`] for the time
//!   history of exchanged values within a window
//! - [`Field`], [`Mesh`], [`CouplingData`] — host-owned buffers and the
//!   scheme's view of them
//! - [`Channel`], [`StateChannel`], [`Acceleration`], [`ConvergenceMeasure`] —
//!   contracts for the collaborators a scheme drives

mod acceleration;
mod action;
mod channel;
mod convergence;
mod data;
mod tolerance;

pub mod time;

pub use acceleration::{Acceleration, AccelerationError};
pub use action::{Action, ActionLedger, Actions};
pub use channel::{Channel, ChannelError, StateChannel};
pub use convergence::ConvergenceMeasure;
pub use data::{
    CouplingData, DataError, DataId, DataMap, DataSettings, Direction, Field, Mesh, MeshId,
};
pub use time::{ExtrapolationOrder, Sample, Storage, Waveform, WindowGrid};
pub use tolerance::{Tolerance, ToleranceError};
