//! Coupling schemes for partitioned co-simulation.
//!
//! A coupling scheme decides, for one participant, when data is exchanged
//! with its partners, whether a time window has converged, and which
//! checkpoint actions the participant has to take before continuing.
//!
//! - [`SerialScheme`] staggers two participants
//! - [`ParallelScheme`] lets two participants exchange simultaneously
//! - [`MultiScheme`] iterates one controller with several partners
//! - [`CompositionalScheme`] schedules several schemes, at most one of them
//!   implicit, behind one participant-facing interface
//!
//! All of them implement [`CouplingScheme`]; [`Scheme`] is the closed set of
//! topologies for hosts that pick one at run time.

mod base;
mod compositional;
mod config;
mod error;
mod multi;
mod parallel;
mod scheme;
mod serial;
mod state;

#[cfg(test)]
mod test_utils;

pub use compositional::CompositionalScheme;
pub use config::{Config, ConfigError, CouplingMode, Participants, Role, TimeWindowSize};
pub use error::Error;
pub use multi::MultiScheme;
pub use parallel::ParallelScheme;
pub use scheme::{ChangedMeshes, CouplingScheme, Scheme};
pub use serial::SerialScheme;
pub use state::{Lifecycle, SchemeState, WindowReport};
