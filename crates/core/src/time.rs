//! Time history of exchanged values within one coupling window.
//!
//! Times inside a window are normalized to `[0, 1]`. A [`Storage`] keeps the
//! samples written so far, a [`Waveform`] reconstructs values between them and
//! a [`WindowGrid`] converts between absolute and normalized time.

mod grid;
mod sample;
mod storage;
mod waveform;

pub use grid::WindowGrid;
pub use sample::{Sample, Stample};
pub use storage::{ExtrapolationOrder, Storage, StorageError};
pub use waveform::{MAX_INTERPOLATION_ORDER, Waveform, WaveformError};
