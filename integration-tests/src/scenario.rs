use lockstep_schemes::{Config, Participants};
use serde::Deserialize;

/// A two-participant scenario as written in `scenarios/*.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub first: String,
    pub second: String,
    pub coupling: Config,
    #[serde(default)]
    pub expect: Expectations,
}

/// What the scenario promises about the run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expectations {
    pub advances: Option<usize>,
    pub iterations: Option<Vec<usize>>,
}

impl Scenario {
    /// # Errors
    ///
    /// Fails if `text` is not a valid scenario.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The participant pair as seen from `local`.
    #[must_use]
    pub fn participants(&self, local: &str) -> Participants {
        Participants::new(&*self.first, &*self.second, local)
    }
}
