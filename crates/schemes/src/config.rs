use lockstep_core::time::MAX_INTERPOLATION_ORDER;
use lockstep_core::{ExtrapolationOrder, Tolerance, ToleranceError};
use serde::{Deserialize, Serialize};

/// How the length of each time window is decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeWindowSize {
    /// Every window has the same length.
    Fixed(f64),
    /// The first participant of a serial scheme picks each window's length
    /// and sends it along with its data.
    FirstParticipant,
}

/// Whether windows are iterated to convergence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CouplingMode {
    #[default]
    Explicit,
    Implicit,
}

/// Configuration shared by all coupling schemes.
///
/// `None` means unbounded for the limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_time: Option<f64>,
    pub max_time_windows: Option<usize>,
    pub time_window_size: TimeWindowSize,
    pub valid_digits: u8,
    pub coupling_mode: CouplingMode,
    pub max_iterations: Option<usize>,
    pub extrapolation_order: ExtrapolationOrder,
    pub interpolation_order: usize,
    pub mesh_synchronization: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_time: None,
            max_time_windows: None,
            time_window_size: TimeWindowSize::Fixed(1.0),
            valid_digits: Tolerance::DEFAULT_VALID_DIGITS,
            coupling_mode: CouplingMode::Explicit,
            max_iterations: None,
            extrapolation_order: ExtrapolationOrder::Constant,
            interpolation_order: 0,
            mesh_synchronization: false,
        }
    }
}

impl Config {
    /// Checks that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max_time) = self.max_time {
            if !max_time.is_finite() || max_time <= 0.0 {
                return Err(ConfigError::MaxTime(max_time));
            }
        }
        if self.max_time_windows == Some(0) {
            return Err(ConfigError::MaxTimeWindows);
        }
        if let TimeWindowSize::Fixed(size) = self.time_window_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(ConfigError::WindowSize(size));
            }
        }
        Tolerance::from_valid_digits(self.valid_digits)?;
        match (self.coupling_mode, self.max_iterations) {
            (_, Some(0)) => return Err(ConfigError::MaxIterations),
            (CouplingMode::Explicit, Some(_)) => return Err(ConfigError::ImplicitOnly("max_iterations")),
            _ => {}
        }
        if self.interpolation_order > MAX_INTERPOLATION_ORDER {
            return Err(ConfigError::InterpolationOrder(self.interpolation_order));
        }
        Ok(())
    }

    /// The comparison policy derived from `valid_digits`.
    ///
    /// # Errors
    ///
    /// Fails if `valid_digits` is out of range.
    pub fn tolerance(&self) -> Result<Tolerance, ConfigError> {
        Ok(Tolerance::from_valid_digits(self.valid_digits)?)
    }

    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.coupling_mode == CouplingMode::Implicit
    }
}

/// Which side of a two-party scheme the local participant plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Sends first; in a serial scheme it computes with the partner's data
    /// from the previous window.
    First,
    /// Receives first; measures convergence and accelerates.
    Second,
}

/// Names of the two participants of a serial or parallel scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participants {
    pub first: String,
    pub second: String,
    pub local: String,
}

impl Participants {
    #[must_use]
    pub fn new(first: impl Into<String>, second: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            local: local.into(),
        }
    }

    /// The role of the local participant.
    ///
    /// # Errors
    ///
    /// Fails if both names are equal or the local name is neither of them.
    pub fn role(&self) -> Result<Role, ConfigError> {
        if self.first == self.second {
            return Err(ConfigError::SameParticipant(self.first.clone()));
        }
        if self.local == self.first {
            Ok(Role::First)
        } else if self.local == self.second {
            Ok(Role::Second)
        } else {
            Err(ConfigError::UnknownLocalParticipant(self.local.clone()))
        }
    }

    /// The name of the other participant.
    #[must_use]
    pub fn remote(&self) -> &str {
        if self.local == self.first {
            &self.second
        } else {
            &self.first
        }
    }
}

/// Errors found while validating or applying a configuration.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_time must be finite and positive, got {0}")]
    MaxTime(f64),

    #[error("max_time_windows must be at least 1")]
    MaxTimeWindows,

    #[error("time window size must be finite and positive, got {0}")]
    WindowSize(f64),

    #[error(transparent)]
    ValidDigits(#[from] ToleranceError),

    #[error("max_iterations must be at least 1")]
    MaxIterations,

    #[error("{0} only applies to implicit coupling")]
    ImplicitOnly(&'static str),

    #[error("interpolation order {0} is not supported")]
    InterpolationOrder(usize),

    #[error("participant {0} cannot be coupled with itself")]
    SameParticipant(String),

    #[error("local participant {0} is not part of this scheme")]
    UnknownLocalParticipant(String),

    #[error("the first participant cannot set the time window size in a {0} scheme")]
    FirstParticipantUnsupported(&'static str),

    #[error("{0} schemes must be implicit")]
    ExplicitUnsupported(&'static str),

    #[error("the first participant of a serial scheme cannot send initial data")]
    FirstParticipantInitialData,

    #[error("an implicit scheme needs a convergence measure or max_iterations")]
    NoConvergenceCriterion,

    #[error("acceleration of received data is not possible in a serial scheme")]
    AcceleratedReceiveData,
}
