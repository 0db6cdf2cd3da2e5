use std::time::Duration;

use crate::shared::constants::FPS_WINDOW;

/// Floor applied to zero-length samples so the rate stays finite.
pub const MIN_SAMPLE_SECS: f64 = 1e-9;

/// Copy of the estimator state for readers outside the pipeline thread.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ThroughputSnapshot {
    pub fps: f64,
    pub samples: usize,
    pub capacity: usize,
    pub last_frame_secs: f64,
}

impl ThroughputSnapshot {
    /// The rate only reflects steady state once the window has filled.
    pub fn is_warm(&self) -> bool {
        self.capacity > 0 && self.samples == self.capacity
    }
}

/// Smoothed frames-per-second over the most recent frame durations.
///
/// Samples live in a fixed arena indexed by a cursor; once full, each new
/// sample overwrites the oldest. The rate is `count / sum(durations)`, which
/// weights frames by the time they actually took.
pub struct ThroughputEstimator {
    samples: Box<[f64]>,
    cursor: usize,
    len: usize,
}

impl ThroughputEstimator {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "throughput window must hold at least one sample");
        Self {
            samples: vec![0.0; capacity].into_boxed_slice(),
            cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_count(&self) -> usize {
        self.len
    }

    pub fn is_full(&self) -> bool {
        self.len == self.samples.len()
    }

    pub fn record_frame(&mut self, duration: Duration) {
        self.record_secs(duration.as_secs_f64());
    }

    fn record_secs(&mut self, secs: f64) {
        let secs = if secs > 0.0 { secs } else { MIN_SAMPLE_SECS };
        self.samples[self.cursor] = secs;
        self.cursor = (self.cursor + 1) % self.samples.len();
        self.len = (self.len + 1).min(self.samples.len());
    }

    /// Frames per second over the live window; 0.0 before the first sample.
    pub fn current_fps(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        // No running total: the window is re-summed on every call.
        let total: f64 = self.window().sum();
        self.len as f64 / total
    }

    pub fn last_sample(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let last = (self.cursor + self.samples.len() - 1) % self.samples.len();
        Some(self.samples[last])
    }

    pub fn snapshot(&self) -> ThroughputSnapshot {
        ThroughputSnapshot {
            fps: self.current_fps(),
            samples: self.len,
            capacity: self.samples.len(),
            last_frame_secs: self.last_sample().unwrap_or(0.0),
        }
    }

    /// Live samples, oldest first.
    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        let cap = self.samples.len();
        let start = (self.cursor + cap - self.len) % cap;
        (0..self.len).map(move |i| self.samples[(start + i) % cap])
    }
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new(FPS_WINDOW)
    }
}
