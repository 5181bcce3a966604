use std::collections::VecDeque;

use tokio::time::{Duration, Instant};

pub const WINDOW_SPAN: Duration = Duration::from_secs(30);
pub const WINDOW_SAMPLES: usize = 120;
const MIN_WINDOW_SECS: f64 = 0.001;

/// Trailing record of `(timestamp, bytes)` samples.
///
/// Retention is by count, not age: once full, the oldest sample is evicted
/// even if it still falls inside the time window.
pub struct RollingWindow {
    samples: VecDeque<(Instant, u64)>,
    max_samples: usize,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_SAMPLES)
    }

    pub fn with_capacity(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, at: Instant, bytes: u64) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back((at, bytes));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Bytes per second over the last `min(30s, now - started_at)`.
    pub fn speed(&self, now: Instant, started_at: Instant) -> f64 {
        let span = now.saturating_duration_since(started_at).min(WINDOW_SPAN);
        let window_start = now.checked_sub(span).unwrap_or(started_at);
        let bytes: u64 = self
            .samples
            .iter()
            .filter(|(at, _)| *at >= window_start)
            .map(|(_, bytes)| bytes)
            .sum();
        bytes as f64 / span.as_secs_f64().max(MIN_WINDOW_SECS)
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new()
    }
}
