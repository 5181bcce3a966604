use tokio::time::{Duration, Instant};

use crate::cancel::StopReason;

const MIN_ELAPSED_SECS: f64 = 0.001;

#[derive(Debug)]
pub struct Stats {
    pub bytes_total: u64,
    pub started_at: Instant,
    pub attempts: u64,
    pub failures: u64,
}

impl Stats {
    pub fn new(started_at: Instant) -> Self {
        Self {
            bytes_total: 0,
            started_at,
            attempts: 0,
            failures: 0,
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.bytes_total = self.bytes_total.saturating_add(bytes as u64);
    }

    pub fn summary(&self, reason: StopReason) -> RunSummary {
        RunSummary {
            bytes_total: self.bytes_total,
            elapsed: self.started_at.elapsed(),
            reason,
            attempts: self.attempts,
            failures: self.failures,
        }
    }
}

/// Figures reported once the run has stopped.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub bytes_total: u64,
    pub elapsed: Duration,
    pub reason: StopReason,
    pub attempts: u64,
    pub failures: u64,
}

impl RunSummary {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64().max(MIN_ELAPSED_SECS)
    }

    pub fn average_rate(&self) -> f64 {
        self.bytes_total as f64 / self.elapsed_secs()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot {
    pub elapsed: Duration,
    pub remaining: Duration,
    pub bytes_total: u64,
    pub speed: f64,
}
