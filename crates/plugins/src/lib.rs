//! Ready-made collaborators for lockstep coupling schemes.
//!
//! - [`convergence`] — absolute, relative, residual-relative and
//!   minimum-iteration convergence measures
//! - [`ConstantRelaxation`] — under-relaxation with a fixed factor
//! - [`MemoryChannel`] — an in-process [`Channel`](lockstep_core::Channel)
//!   for participants running on threads of one process

pub mod convergence;

mod memory;
mod relaxation;

pub use memory::MemoryChannel;
pub use relaxation::ConstantRelaxation;
