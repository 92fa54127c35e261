use serde::{Deserialize, Serialize};

use crate::Tolerance;

use super::{Sample, Stample};

/// How the next window's seed is predicted from the finished window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtrapolationOrder {
    /// Repeat the end value of the finished window.
    #[default]
    Constant,
    /// `2 * end - start` of the finished window.
    Linear,
}

impl ExtrapolationOrder {
    /// Numeric order: 0 or 1.
    #[must_use]
    pub fn order(self) -> usize {
        match self {
            ExtrapolationOrder::Constant => 0,
            ExtrapolationOrder::Linear => 1,
        }
    }

    fn extrapolate(self, start: &Sample, end: &Sample) -> Sample {
        match self {
            ExtrapolationOrder::Constant => end.clone(),
            ExtrapolationOrder::Linear => end.combine(2.0, start, -1.0),
        }
    }
}

/// Errors raised by [`Storage`] writes and window moves.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("normalized time {time} is outside the window [0, 1]")]
    OutsideWindow { time: f64 },

    #[error("cannot write at normalized time {time}, a sample at {latest} already exists; trim first")]
    NotAfterLatest { time: f64, latest: f64 },

    #[error("sample has {found} values, storage holds samples of {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("storage is empty")]
    Empty,

    #[error("window is incomplete, the latest sample is at {latest} instead of 1")]
    IncompleteWindow { latest: f64 },
}

/// Ordered samples of one window at normalized times in `[0, 1]`.
///
/// Times strictly increase. Writing at or before the latest stored time is
/// rejected; callers [`trim`](Storage::trim) back to the window start first.
#[derive(Debug, Clone, Default)]
pub struct Storage {
    stamples: Vec<Stample>,
    tolerance: Tolerance,
}

impl Storage {
    pub const WINDOW_START: f64 = 0.0;
    pub const WINDOW_END: f64 = 1.0;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tolerance(tolerance: Tolerance) -> Self {
        Self {
            stamples: Vec::new(),
            tolerance,
        }
    }

    /// Seeds both window anchors with `sample`, dropping everything else.
    pub fn initialize(&mut self, sample: Sample) {
        self.stamples.clear();
        self.stamples.push(Stample {
            time: Self::WINDOW_START,
            sample: sample.clone(),
        });
        self.stamples.push(Stample {
            time: Self::WINDOW_END,
            sample,
        });
    }

    /// Appends `sample` at normalized `time`.
    ///
    /// Times within tolerance of the window end are stored as exactly `1.0`.
    ///
    /// # Errors
    ///
    /// Fails if `time` lies outside `[0, 1]`, is not strictly after the
    /// latest stored time, or if the sample size differs from stored ones.
    pub fn set_sample_at_time(&mut self, time: f64, sample: Sample) -> Result<(), StorageError> {
        let tol = self.tolerance;
        if tol.smaller(time, Self::WINDOW_START) || tol.greater(time, Self::WINDOW_END) {
            return Err(StorageError::OutsideWindow { time });
        }
        if let Some(latest) = self.max_stored_time() {
            if !tol.greater(time, latest) {
                return Err(StorageError::NotAfterLatest { time, latest });
            }
        }
        if let Some(first) = self.stamples.first() {
            if first.sample.len() != sample.len() {
                return Err(StorageError::SizeMismatch {
                    expected: first.sample.len(),
                    found: sample.len(),
                });
            }
        }

        let time = if tol.equals(time, Self::WINDOW_END) {
            Self::WINDOW_END
        } else if tol.equals(time, Self::WINDOW_START) {
            Self::WINDOW_START
        } else {
            time
        };
        self.stamples.push(Stample { time, sample });
        Ok(())
    }

    /// Keeps only the window start anchor.
    pub fn trim(&mut self) {
        let tol = self.tolerance;
        self.stamples
            .retain(|stample| tol.equals(stample.time, Self::WINDOW_START));
    }

    /// Rolls the storage over to the next window.
    ///
    /// The finished window's end becomes the new start anchor and the
    /// extrapolated sample becomes the new end anchor. Interior samples are
    /// ignored by the extrapolation.
    ///
    /// # Errors
    ///
    /// Fails if the storage is empty or the window has no end sample yet.
    pub fn move_to_next_window(&mut self, order: ExtrapolationOrder) -> Result<(), StorageError> {
        let (Some(start), Some(end)) = (self.stamples.first(), self.stamples.last()) else {
            return Err(StorageError::Empty);
        };
        if !self.tolerance.equals(end.time, Self::WINDOW_END) {
            return Err(StorageError::IncompleteWindow { latest: end.time });
        }

        let seed = order.extrapolate(&start.sample, &end.sample);
        let new_start = end.sample.clone();
        self.stamples.clear();
        self.stamples.push(Stample {
            time: Self::WINDOW_START,
            sample: new_start,
        });
        self.stamples.push(Stample {
            time: Self::WINDOW_END,
            sample: seed,
        });
        Ok(())
    }

    #[must_use]
    pub fn max_stored_time(&self) -> Option<f64> {
        self.stamples.last().map(|stample| stample.time)
    }

    #[must_use]
    pub fn stamples(&self) -> &[Stample] {
        &self.stamples
    }

    #[must_use]
    pub fn times(&self) -> Vec<f64> {
        self.stamples.iter().map(|stample| stample.time).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stamples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stamples.is_empty()
    }

    /// Returns the first sample stored at or after `time`.
    #[must_use]
    pub fn sample_at_or_after(&self, time: f64) -> Option<&Sample> {
        let tol = self.tolerance;
        self.stamples
            .iter()
            .find(|stample| tol.greater_equals(stample.time, time))
            .map(|stample| &stample.sample)
    }

    /// The sample at the window start anchor.
    #[must_use]
    pub fn window_start(&self) -> Option<&Sample> {
        self.stamples
            .first()
            .filter(|stample| self.tolerance.equals(stample.time, Self::WINDOW_START))
            .map(|stample| &stample.sample)
    }

    /// The latest stored sample.
    #[must_use]
    pub fn latest(&self) -> Option<&Sample> {
        self.stamples.last().map(|stample| &stample.sample)
    }

    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }
}
