use std::rc::Rc;

use lockstep_core::{Action, DataError, DataId, Field, Mesh, MeshId};
use lockstep_schemes::{CouplingScheme, Error};
use ndarray::Array1;

/// Where the host stands when it solves a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub window: usize,
    pub iteration: usize,
    pub time: f64,
    pub dt: f64,
}

#[must_use]
pub fn mesh(id: usize, name: &str) -> Rc<Mesh> {
    Rc::new(Mesh::new(MeshId(id), name, 1))
}

/// A single-valued field, enough to follow values through a scenario.
#[must_use]
pub fn scalar_field(id: usize, name: &str, value: f64) -> Rc<Field> {
    Rc::new(Field::new(DataId(id), name, 1, Array1::from_elem(1, value)))
}

#[must_use]
pub fn read(field: &Field) -> f64 {
    field.values()[0]
}

/// # Errors
///
/// Never fails for fields built by [`scalar_field`].
pub fn write(field: &Field, value: f64) -> Result<(), DataError> {
    field.write(Array1::from_elem(1, value))
}

/// Fulfils pending checkpoint actions.
///
/// The scenarios keep no solver state, so saving and restoring is a no-op.
///
/// # Errors
///
/// Fails if the scheme rejects the action.
pub fn fulfil_checkpoints<S: CouplingScheme + ?Sized>(scheme: &mut S) -> Result<(), Error> {
    for action in [Action::WriteCheckpoint, Action::ReadCheckpoint] {
        if scheme.is_action_required(action) {
            scheme.mark_action_fulfilled(action)?;
        }
    }
    Ok(())
}

/// Runs the host loop until coupling ends, then finalizes.
///
/// Each step is at most `max_dt` long; `solve` is called before the step is
/// reported to the scheme. Returns the number of advances.
///
/// # Errors
///
/// Propagates the first scheme error.
pub fn run<S, F>(scheme: &mut S, max_dt: f64, mut solve: F) -> Result<usize, Error>
where
    S: CouplingScheme + ?Sized,
    F: FnMut(Step),
{
    let mut advances = 0;
    while scheme.is_coupling_ongoing() {
        fulfil_checkpoints(scheme)?;
        let dt = scheme
            .next_time_step_max_length()
            .map_or(max_dt, |max| max.min(max_dt));
        solve(Step {
            window: scheme.time_windows(),
            iteration: scheme.iterations(),
            time: scheme.time(),
            dt,
        });
        scheme.add_computed_time(dt)?;
        scheme.advance()?;
        advances += 1;
    }
    scheme.finalize()?;
    Ok(advances)
}
