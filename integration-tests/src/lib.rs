//! Harness for running coupled participants against each other.
//!
//! Schemes hold host fields behind `Rc`, so every participant builds its
//! scheme on its own thread; only the channels cross threads.

pub mod host;
pub mod scenario;
