use ndarray::{Array1, Array2};

/// Values of one field at one instant, with an optional gradient.
///
/// Gradients are stored row-major with one row per value component.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: Array1<f64>,
    pub gradient: Option<Array2<f64>>,
}

impl Sample {
    #[must_use]
    pub fn new(values: Array1<f64>) -> Self {
        Self {
            values,
            gradient: None,
        }
    }

    #[must_use]
    pub fn with_gradient(values: Array1<f64>, gradient: Array2<f64>) -> Self {
        Self {
            values,
            gradient: Some(gradient),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns `a * self + b * other`, component-wise.
    ///
    /// The gradient is combined only when both samples carry one of the same
    /// shape; otherwise the gradient of `self` is kept.
    pub(crate) fn combine(&self, a: f64, other: &Sample, b: f64) -> Sample {
        let values = &self.values * a + &other.values * b;
        let gradient = match (&self.gradient, &other.gradient) {
            (Some(g), Some(h)) if g.dim() == h.dim() => Some(g * a + h * b),
            (g, _) => g.clone(),
        };
        Sample { values, gradient }
    }
}

impl From<Array1<f64>> for Sample {
    fn from(values: Array1<f64>) -> Self {
        Self::new(values)
    }
}

/// A sample stamped with its normalized time in the window.
#[derive(Debug, Clone, PartialEq)]
pub struct Stample {
    pub time: f64,
    pub sample: Sample,
}
