//! Running block error rate

use arraydeque::ArrayDeque;

/// Number of groups in the averaging window
pub const BLER_WINDOW: usize = 12;

/// Moving average over the last [`BLER_WINDOW`] values
///
/// Inputs are clamped to `[0.0, 1.0]`, so the average is
/// too. Before any value is pushed, the average is zero.
#[derive(Clone, Debug, Default)]
pub struct RunningAverage {
    history: ArrayDeque<f32, BLER_WINDOW, arraydeque::Wrapping>,
}

impl RunningAverage {
    /// New, empty average
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, displacing the oldest one once the window is full
    pub fn push(&mut self, value: f32) {
        self.history.push_back(f32::clamp(value, 0.0f32, 1.0f32));
    }

    /// Mean of the values in the window
    pub fn average(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0f32;
        }
        let sum: f32 = self.history.iter().sum();
        f32::clamp(sum / self.history.len() as f32, 0.0f32, 1.0f32)
    }

    /// Number of values in the window
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// True if nothing has been pushed since the last reset
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Forget all values
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_empty() {
        let avg = RunningAverage::new();
        assert!(avg.is_empty());
        assert_eq!(0.0f32, avg.average());
    }

    #[test]
    fn test_alternating_errors() {
        let mut avg = RunningAverage::new();
        for errors in [0u8, 4, 0, 4] {
            avg.push(errors as f32 / 4.0);
        }
        assert!(avg.average() > 0.0 && avg.average() < 1.0);
        assert_approx_eq!(avg.average(), 0.5f32);

        for i in 0..100 {
            avg.push((i % 2) as f32);
            assert!(avg.average() > 0.0 && avg.average() < 1.0);
        }
        assert_approx_eq!(avg.average(), 0.5f32);
    }

    #[test]
    fn test_window() {
        let mut avg = RunningAverage::new();
        for _i in 0..BLER_WINDOW {
            avg.push(1.0);
        }
        assert_approx_eq!(avg.average(), 1.0f32);

        for _i in 0..BLER_WINDOW {
            avg.push(0.0);
        }
        assert_eq!(BLER_WINDOW, avg.len());
        assert_eq!(0.0f32, avg.average());
    }

    #[test]
    fn test_clamp() {
        let mut avg = RunningAverage::new();
        avg.push(7.0);
        avg.push(-3.0);
        assert_approx_eq!(avg.average(), 0.5f32);

        avg.reset();
        assert!(avg.is_empty());
    }
}
