use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Problems with the run parameters. Any of these aborts before traffic starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--hours must be > 0 (got {0})")]
    InvalidDuration(f64),

    #[error("--rate must be > 0 (got {0})")]
    InvalidRate(f64),

    #[error("--{name} must be a positive number of seconds (got {value})")]
    InvalidTimeout { name: &'static str, value: f64 },

    #[error("--log-interval must be >= 0 (got {0})")]
    InvalidLogInterval(f64),

    #[error("--chunk-kb must be at most {max} (got {value})")]
    InvalidChunkSize { value: usize, max: usize },

    #[error("--burst-secs is out of range (got {0})")]
    InvalidBurst(f64),

    #[error("failed to read URL file {path:?}: {source}")]
    SourceFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("URL file {0:?} contains no URLs")]
    EmptySourceFile(PathBuf),

    #[error("invalid URL on line {line}: {url}: {reason}")]
    InvalidSource {
        line: usize,
        url: String,
        reason: String,
    },

    #[error("no source URLs configured")]
    NoSources,
}
