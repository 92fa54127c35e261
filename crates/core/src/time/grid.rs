use crate::Tolerance;

/// Absolute time interval of one window, mapped onto `[0, 1]`.
///
/// A zero-length window maps every time onto itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGrid {
    start: f64,
    end: f64,
}

impl WindowGrid {
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_degenerate(&self, tolerance: Tolerance) -> bool {
        tolerance.equals(self.length(), 0.0)
    }

    /// Absolute `time` to normalized window time.
    #[must_use]
    pub fn normalize(&self, time: f64, tolerance: Tolerance) -> f64 {
        if self.is_degenerate(tolerance) {
            return time;
        }
        (time - self.start) / self.length()
    }

    /// Normalized window time to absolute time.
    #[must_use]
    pub fn denormalize(&self, normalized: f64, tolerance: Tolerance) -> f64 {
        if self.is_degenerate(tolerance) {
            return normalized;
        }
        self.start + normalized * self.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn normalizes_within_window() {
        let tol = Tolerance::default();
        let grid = WindowGrid::new(2.0, 2.5);
        assert_relative_eq!(grid.normalize(2.0, tol), 0.0);
        assert_relative_eq!(grid.normalize(2.25, tol), 0.5);
        assert_relative_eq!(grid.denormalize(1.0, tol), 2.5);
    }

    #[test]
    fn zero_length_window_is_identity() {
        let tol = Tolerance::default();
        let point = WindowGrid::new(3.0, 3.0);
        assert!(point.is_degenerate(tol));
        assert_relative_eq!(point.normalize(0.4, tol), 0.4);
        assert_relative_eq!(point.denormalize(0.4, tol), 0.4);
    }
}
