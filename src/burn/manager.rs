use std::path::PathBuf;

use anyhow::Result;
use log::{debug, info};
use tokio::time::{sleep, Duration, Instant};

use crate::burn::bandwidth::BandwidthLimiter;
use crate::burn::fetch::FetchDriver;
use crate::burn::mirror::SourceRotation;
use crate::burn::retry::Backoff;
use crate::burn::stats::{RunSummary, StatusSnapshot, Stats};
use crate::burn::window::RollingWindow;
use crate::burn::RunConfig;
use crate::cancel::{CancelToken, StopReason, Watchers, STOP_FILE_POLL};
use crate::report::StatusReporter;
use crate::util::format_bytes;

// used when `start + duration` does not fit in an Instant
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

pub struct BurnManager {
    config: RunConfig,
    driver: FetchDriver,
    sources: SourceRotation,
    cancel: CancelToken,
}

/// Everything the fetch loop mutates while a run is in progress.
pub struct RunState {
    pub cancel: CancelToken,
    pub end_at: Instant,
    pub stop_file: Option<PathBuf>,
    pub limiter: BandwidthLimiter,
    pub stats: Stats,
    pub window: RollingWindow,
    pub reporter: StatusReporter,
}

impl BurnManager {
    pub fn new(config: RunConfig, cancel: CancelToken) -> Result<Self> {
        let sources = SourceRotation::new(config.sources.clone())?;
        let driver = FetchDriver::new(&config)?;
        Ok(Self {
            config,
            driver,
            sources,
            cancel,
        })
    }

    /// Drives fetch attempts until the deadline, a signal or the stop file.
    pub async fn run(mut self) -> RunSummary {
        let started_at = Instant::now();
        let end_at = started_at
            .checked_add(self.config.duration)
            .unwrap_or_else(|| started_at + FAR_FUTURE);

        let mut reporter =
            StatusReporter::new(self.config.output, self.config.log_interval, started_at);
        reporter.start(&self.config);

        let mut watchers = Watchers::new();
        watchers.deadline(self.cancel.clone(), end_at);
        if let Some(path) = &self.config.stop_file {
            watchers.stop_file(self.cancel.clone(), path.clone(), STOP_FILE_POLL);
        }

        let mut state = RunState {
            cancel: self.cancel.clone(),
            end_at,
            stop_file: self.config.stop_file.clone(),
            limiter: BandwidthLimiter::new(self.config.rate_bytes_per_sec, self.config.burst),
            stats: Stats::new(started_at),
            window: RollingWindow::new(),
            reporter,
        };
        debug!(
            "limiter: {}/s with {} burst capacity over {} sources",
            format_bytes(state.limiter.rate() as u64),
            format_bytes(state.limiter.capacity() as u64),
            self.sources.len()
        );

        let mut backoff = Backoff::new(self.config.retry);
        while !state.check_stop() {
            let url = self.sources.next().clone();
            state.stats.attempts += 1;
            match self.driver.drain(&url, &mut state).await {
                Ok(()) => backoff.on_success(),
                Err(err) => {
                    state.stats.failures += 1;
                    let delay = backoff.on_failure();
                    debug!(
                        "attempt against {url} failed ({} in a row): {err:?}",
                        backoff.failures()
                    );
                    state.reporter.source_failed(&url, &err, delay);
                    state.wait_backoff(delay).await;
                }
            }
        }
        drop(watchers);
        debug!("limiter left with {:.0} tokens", state.limiter.tokens());

        let reason = state.cancel.reason().unwrap_or(StopReason::Deadline);
        info!("stopping: {reason}");
        let summary = state.stats.summary(reason);
        state
            .reporter
            .finish(&summary, self.config.stop_file.as_deref());
        summary
    }
}

impl RunState {
    /// Checks cancellation, then the deadline, then the stop file. The first
    /// condition found is recorded on the token.
    pub fn check_stop(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        if Instant::now() >= self.end_at {
            self.cancel.cancel(StopReason::Deadline);
            return true;
        }
        if let Some(path) = &self.stop_file {
            if path.exists() {
                self.cancel.cancel(StopReason::StopFile);
                return true;
            }
        }
        false
    }

    pub fn record_chunk(&mut self, len: usize) {
        let now = Instant::now();
        self.stats.record(len);
        self.window.record(now, len as u64);
        if self.reporter.is_due(now) {
            let snapshot = self.snapshot(now);
            self.reporter.status(&snapshot, now);
        }
    }

    pub fn snapshot(&self, now: Instant) -> StatusSnapshot {
        StatusSnapshot {
            elapsed: now.saturating_duration_since(self.stats.started_at),
            remaining: self.end_at.saturating_duration_since(now),
            bytes_total: self.stats.bytes_total,
            speed: self.window.speed(now, self.stats.started_at),
        }
    }

    /// Sleeps between attempts. Unlike a plain sleep this returns as soon as
    /// the run is cancelled.
    pub async fn wait_backoff(&self, delay: Duration) {
        tokio::select! {
            _ = sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}
