use serde::{Deserialize, Serialize};

/// Epsilon comparison policy derived from a number of valid digits.
///
/// A single `Tolerance` is shared by everything that compares times: window
/// completion, remainder checks, the "still ongoing" test and the normalized
/// times inside a [`Storage`](crate::Storage).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tolerance {
    valid_digits: u8,
    eps: f64,
}

/// The number of valid digits is outside `1..=16`.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("valid digits must be within 1..=16, got {0}")]
pub struct ToleranceError(pub u8);

impl Tolerance {
    pub const DEFAULT_VALID_DIGITS: u8 = 10;

    /// Creates a tolerance with `eps = 10^-valid_digits`.
    ///
    /// # Errors
    ///
    /// Returns an error if `valid_digits` is not within `1..=16`.
    pub fn from_valid_digits(valid_digits: u8) -> Result<Self, ToleranceError> {
        if !(1..=16).contains(&valid_digits) {
            return Err(ToleranceError(valid_digits));
        }
        Ok(Self {
            valid_digits,
            eps: 10f64.powi(-i32::from(valid_digits)),
        })
    }

    #[must_use]
    pub fn valid_digits(&self) -> u8 {
        self.valid_digits
    }

    #[must_use]
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// `|a - b| <= eps`
    #[must_use]
    pub fn equals(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    /// `a - b > eps`
    #[must_use]
    pub fn greater(&self, a: f64, b: f64) -> bool {
        a - b > self.eps
    }

    /// `a - b >= -eps`
    #[must_use]
    pub fn greater_equals(&self, a: f64, b: f64) -> bool {
        a - b >= -self.eps
    }

    /// `b - a > eps`
    #[must_use]
    pub fn smaller(&self, a: f64, b: f64) -> bool {
        self.greater(b, a)
    }

    /// `a - b <= eps`
    #[must_use]
    pub fn smaller_equals(&self, a: f64, b: f64) -> bool {
        a - b <= self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            valid_digits: Self::DEFAULT_VALID_DIGITS,
            eps: 10f64.powi(-i32::from(Self::DEFAULT_VALID_DIGITS)),
        }
    }
}

impl TryFrom<u8> for Tolerance {
    type Error = ToleranceError;

    fn try_from(valid_digits: u8) -> Result<Self, Self::Error> {
        Self::from_valid_digits(valid_digits)
    }
}

impl From<Tolerance> for u8 {
    fn from(tolerance: Tolerance) -> Self {
        tolerance.valid_digits
    }
}
