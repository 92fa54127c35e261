use std::fmt;

use serde::{Deserialize, Serialize};

/// A step the participant must take before the scheme may continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Save the solver state so the window can be repeated.
    WriteCheckpoint,
    /// Restore the saved solver state; the window is repeated.
    ReadCheckpoint,
    /// Write initial values into data that is exchanged by `initialize_data`.
    InitializeInitialData,
}

impl Action {
    /// All actions, in bit order.
    pub const ALL: [Action; 3] = [
        Action::WriteCheckpoint,
        Action::ReadCheckpoint,
        Action::InitializeInitialData,
    ];

    fn bit(self) -> u8 {
        match self {
            Action::WriteCheckpoint => 1,
            Action::ReadCheckpoint => 1 << 1,
            Action::InitializeInitialData => 1 << 2,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::WriteCheckpoint => "write-iteration-checkpoint",
            Action::ReadCheckpoint => "read-iteration-checkpoint",
            Action::InitializeInitialData => "write-initial-data",
        };
        f.write_str(name)
    }
}

/// A small set of [`Action`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actions(u8);

impl Actions {
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Adds `action`, returning `true` if it was not already present.
    pub fn insert(&mut self, action: Action) -> bool {
        let absent = !self.contains(action);
        self.0 |= action.bit();
        absent
    }

    /// Removes `action`, returning `true` if it was present.
    pub fn remove(&mut self, action: Action) -> bool {
        let present = self.contains(action);
        self.0 &= !action.bit();
        present
    }

    #[must_use]
    pub fn contains(&self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    #[must_use]
    pub fn union(self, other: Actions) -> Actions {
        Actions(self.0 | other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|action| self.contains(*action))
    }
}

impl FromIterator<Action> for Actions {
    fn from_iter<T: IntoIterator<Item = Action>>(iter: T) -> Self {
        let mut actions = Actions::new();
        for action in iter {
            actions.insert(action);
        }
        actions
    }
}

impl fmt::Display for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for action in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{action}")?;
            first = false;
        }
        Ok(())
    }
}

/// Required and fulfilled actions of one scheme.
///
/// Requiring an action clears its fulfilled bit. Fulfilling moves the action
/// from the required set into the fulfilled set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLedger {
    required: Actions,
    fulfilled: Actions,
}

impl ActionLedger {
    pub fn require(&mut self, action: Action) {
        self.required.insert(action);
        self.fulfilled.remove(action);
    }

    /// Marks `action` fulfilled, returning `false` if it was not required.
    pub fn fulfil(&mut self, action: Action) -> bool {
        if !self.required.remove(action) {
            return false;
        }
        self.fulfilled.insert(action);
        true
    }

    #[must_use]
    pub fn is_required(&self, action: Action) -> bool {
        self.required.contains(action)
    }

    #[must_use]
    pub fn is_fulfilled(&self, action: Action) -> bool {
        self.fulfilled.contains(action)
    }

    #[must_use]
    pub fn required(&self) -> Actions {
        self.required
    }

    #[must_use]
    pub fn fulfilled(&self) -> Actions {
        self.fulfilled
    }

    /// Forgets fulfilled actions once a step has consumed them.
    pub fn clear_fulfilled(&mut self) {
        self.fulfilled.clear();
    }

    /// Rebuilds a ledger from mirrored sets.
    #[must_use]
    pub fn restore(required: Actions, fulfilled: Actions) -> Self {
        Self {
            required,
            fulfilled,
        }
    }
}
