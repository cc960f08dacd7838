//! Sliding window of achieved updates per second.
//!
//! The manager records the duration of every loop iteration (tick plus
//! throttle sleep). The mean of the last few rates is reported as UPS. The
//! value is informational only and never feeds back into scheduling.

use std::collections::VecDeque;
use std::time::Duration;

/// Default number of samples kept.
pub const DEFAULT_WINDOW: usize = 50;

/// Bounded window of per-iteration rates.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl ThroughputWindow {
    /// Create an empty window keeping at most `capacity` samples (at
    /// least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one iteration that took `elapsed`.
    ///
    /// Zero-length iterations carry no rate information and are skipped.
    pub fn record(&mut self, elapsed: Duration) {
        if elapsed.is_zero() {
            return;
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(1.0 / elapsed.as_secs_f64());
    }

    /// Mean rate over the window, or 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.samples.len() as f64;
        sum / count
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Return `true` if no samples are held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for ThroughputWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_reports_zero() {
        assert_eq!(ThroughputWindow::default().mean(), 0.0);
    }

    #[test]
    fn mean_of_rates() {
        let mut window = ThroughputWindow::new(10);
        window.record(Duration::from_millis(100));
        window.record(Duration::from_millis(50));
        assert!((window.mean() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn oldest_samples_fall_out() {
        let mut window = ThroughputWindow::new(2);
        window.record(Duration::from_secs(1));
        window.record(Duration::from_millis(500));
        window.record(Duration::from_millis(250));
        assert_eq!(window.len(), 2);
        assert!((window.mean() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_durations_are_skipped() {
        let mut window = ThroughputWindow::new(0);
        window.record(Duration::ZERO);
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 1);
    }
}
