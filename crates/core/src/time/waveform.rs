use ndarray::Array1;

use crate::Tolerance;

use super::{Stample, Storage};

/// Highest polynomial order a [`Waveform`] reconstructs with.
pub const MAX_INTERPOLATION_ORDER: usize = 3;

/// Errors raised when configuring or sampling a [`Waveform`].
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum WaveformError {
    #[error("interpolation order {0} exceeds the maximum of {MAX_INTERPOLATION_ORDER}")]
    OrderTooHigh(usize),

    #[error("waveform has no samples")]
    Empty,

    #[error("normalized time {time} is outside the window [0, 1]")]
    OutsideWindow { time: f64 },

    #[error("normalized time {time} lies beyond the latest sample at {latest}")]
    BeyondLatest { time: f64, latest: f64 },
}

/// Continuous reconstruction of a field over one window.
///
/// Values between stored samples come from a polynomial of the requested
/// order through neighbouring samples. With too few samples the order drops
/// to `samples - 1`, and order 0 returns the first sample at or after `t`.
#[derive(Debug, Clone)]
pub struct Waveform {
    storage: Storage,
    interpolation_order: usize,
}

impl Waveform {
    /// Creates an empty waveform.
    ///
    /// # Errors
    ///
    /// Fails if `interpolation_order` exceeds [`MAX_INTERPOLATION_ORDER`].
    pub fn new(interpolation_order: usize, tolerance: Tolerance) -> Result<Self, WaveformError> {
        if interpolation_order > MAX_INTERPOLATION_ORDER {
            return Err(WaveformError::OrderTooHigh(interpolation_order));
        }
        Ok(Self {
            storage: Storage::with_tolerance(tolerance),
            interpolation_order,
        })
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    #[must_use]
    pub fn interpolation_order(&self) -> usize {
        self.interpolation_order
    }

    /// Order actually used with the samples stored right now.
    #[must_use]
    pub fn used_order(&self) -> usize {
        self.interpolation_order
            .min(self.storage.len().saturating_sub(1))
    }

    /// Reconstructs the values at normalized time `t`.
    ///
    /// # Errors
    ///
    /// Fails if the waveform is empty, `t` lies outside `[0, 1]` or after the
    /// latest stored sample.
    pub fn sample(&self, t: f64) -> Result<Array1<f64>, WaveformError> {
        let tol = self.storage.tolerance();
        let Some(latest) = self.storage.max_stored_time() else {
            return Err(WaveformError::Empty);
        };
        if tol.smaller(t, Storage::WINDOW_START) || tol.greater(t, Storage::WINDOW_END) {
            return Err(WaveformError::OutsideWindow { time: t });
        }
        if tol.greater(t, latest) {
            return Err(WaveformError::BeyondLatest { time: t, latest });
        }

        let order = self.used_order();
        if order == 0 {
            return self
                .storage
                .sample_at_or_after(t)
                .map(|sample| sample.values.clone())
                .ok_or(WaveformError::BeyondLatest { time: t, latest });
        }

        let stamples = self.storage.stamples();
        let nodes = &stamples[node_range(stamples, t, order)];
        Ok(lagrange(nodes, t))
    }
}

/// Picks `order + 1` consecutive samples, centred on the segment holding `t`.
fn node_range(stamples: &[Stample], t: f64, order: usize) -> std::ops::Range<usize> {
    let count = order + 1;
    let segment = stamples
        .windows(2)
        .position(|pair| t <= pair[1].time)
        .unwrap_or(stamples.len() - 2);
    let start = segment
        .saturating_sub((order - 1) / 2)
        .min(stamples.len() - count);
    start..start + count
}

fn lagrange(nodes: &[Stample], t: f64) -> Array1<f64> {
    let mut result = Array1::zeros(nodes[0].sample.len());
    for (i, node) in nodes.iter().enumerate() {
        let weight: f64 = nodes
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, other)| (t - other.time) / (node.time - other.time))
            .product();
        result.scaled_add(weight, &node.sample.values);
    }
    result
}
