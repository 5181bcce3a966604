use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::burn::{OutputMode, RetryPolicy, RunConfig, DEFAULT_BURST, MAX_CHUNK_KB, MIB};
use crate::error::ConfigError;
use crate::util::load_sources;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "trafficburn",
    author,
    version,
    about = "Consume network traffic at a target rate",
    long_about = None,
    allow_negative_numbers = true
)]
pub struct Cli {
    /// Run duration in hours
    #[arg(long = "hours", value_name = "hours", default_value_t = 1.0)]
    pub hours: f64,

    /// Target rate in MB/s
    #[arg(long = "rate", value_name = "MB/s", default_value_t = 0.5)]
    pub rate: f64,

    /// Read chunk size in KB (at most 65536)
    #[arg(long = "chunk-kb", value_name = "KB", default_value_t = 64)]
    pub chunk_kb: usize,

    /// Text file with download URLs, one per line
    #[arg(long = "urls-file", value_name = "path")]
    pub urls_file: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", value_name = "secs", default_value_t = 10.0)]
    pub connect_timeout: f64,

    /// Read timeout in seconds
    #[arg(long = "read-timeout", value_name = "secs", default_value_t = 20.0)]
    pub read_timeout: f64,

    /// Print stats every N seconds
    #[arg(long = "log-interval", value_name = "secs", default_value_t = 5.0)]
    pub log_interval: f64,

    /// Exit gracefully once this file exists (empty disables)
    #[arg(long = "stop-file", value_name = "path", default_value = "stop.flag")]
    pub stop_file: String,

    /// Token bucket burst window in seconds [default: 1.5]
    #[arg(long = "burst-secs", value_name = "secs")]
    pub burst_secs: Option<f64>,

    /// Quiet mode: only stop/done output, failures logged as warnings
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Stream status as newline-delimited JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    pub json: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

impl TryFrom<Cli> for RunConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, ConfigError> {
        let duration = positive_secs(cli.hours * 3600.0)
            .ok_or(ConfigError::InvalidDuration(cli.hours))?;
        if !(cli.rate.is_finite() && cli.rate > 0.0) {
            return Err(ConfigError::InvalidRate(cli.rate));
        }
        let connect_timeout = positive_secs(cli.connect_timeout).ok_or(
            ConfigError::InvalidTimeout {
                name: "connect-timeout",
                value: cli.connect_timeout,
            },
        )?;
        let read_timeout = positive_secs(cli.read_timeout).ok_or(ConfigError::InvalidTimeout {
            name: "read-timeout",
            value: cli.read_timeout,
        })?;
        let log_interval = if cli.log_interval == 0.0 {
            Duration::ZERO
        } else {
            positive_secs(cli.log_interval)
                .ok_or(ConfigError::InvalidLogInterval(cli.log_interval))?
        };
        if cli.chunk_kb > MAX_CHUNK_KB {
            return Err(ConfigError::InvalidChunkSize {
                value: cli.chunk_kb,
                max: MAX_CHUNK_KB,
            });
        }
        // the limiter floors anything shorter than 0.1s
        let burst = match cli.burst_secs {
            Some(secs) if secs <= 0.0 => Duration::ZERO,
            Some(secs) => positive_secs(secs).ok_or(ConfigError::InvalidBurst(secs))?,
            None => DEFAULT_BURST,
        };

        let sources = load_sources(cli.urls_file.as_deref())?;
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let stop_file = if cli.stop_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(cli.stop_file))
        };

        let output = if cli.json {
            OutputMode::Json
        } else if cli.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Text
        };

        Ok(RunConfig {
            sources,
            duration,
            rate_bytes_per_sec: cli.rate * MIB,
            burst,
            chunk_size: cli.chunk_kb.max(1) * 1024,
            connect_timeout,
            read_timeout,
            log_interval,
            stop_file,
            retry: RetryPolicy::default(),
            output,
        })
    }
}

fn positive_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}
