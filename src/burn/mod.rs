mod bandwidth;
mod fetch;
mod manager;
mod mirror;
mod retry;
mod stats;
mod window;

#[cfg(test)]
mod testing;

pub use bandwidth::DEFAULT_BURST;
pub use manager::BurnManager;
pub use retry::{FailureKind, FetchError, RetryPolicy};
pub use stats::{RunSummary, StatusSnapshot};

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const MIB: f64 = 1024.0 * 1024.0;
/// Largest accepted `--chunk-kb` (64 MB).
pub const MAX_CHUNK_KB: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sources: Vec<Url>,
    pub duration: Duration,
    pub rate_bytes_per_sec: f64,
    pub burst: Duration,
    pub chunk_size: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub log_interval: Duration,
    pub stop_file: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub output: OutputMode,
}

impl RunConfig {
    pub fn rate_mib(&self) -> f64 {
        self.rate_bytes_per_sec / MIB
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration.as_secs_f64() / 3600.0
    }

    pub fn chunk_kib(&self) -> usize {
        self.chunk_size / 1024
    }
}
