use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Why a single fetch attempt failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: &'static str, after: Duration },

    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: Url },

    #[error("stream error: {0}")]
    Stream(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connect,
    Timeout,
    Http,
    Stream,
    Other,
}

impl FetchError {
    /// Maps a reqwest error raised while sending the request. The client only
    /// carries a connect timeout, so a timeout here is a connect timeout.
    pub fn from_request(err: reqwest::Error, connect_timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                phase: "connect",
                after: connect_timeout,
            }
        } else if err.is_connect() {
            FetchError::Connect(err)
        } else {
            FetchError::Request(err)
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Connect(_) => FailureKind::Connect,
            FetchError::Timeout { .. } => FailureKind::Timeout,
            FetchError::Status { .. } => FailureKind::Http,
            FetchError::Stream(_) => FailureKind::Stream,
            FetchError::Request(_) => FailureKind::Other,
        }
    }
}

/// Exponential backoff: `min(cap, base * 2^min(failures, max_exponent))`.
///
/// The defaults yield 2s, 4s, 8s, 8s, ... for consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max_exponent: u32,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_exponent: 3,
            cap: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u32 << failures.min(self.max_exponent).min(31);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Consecutive-failure counter shared by every source in a run.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Counts a failed attempt and returns how long to wait before the next one.
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.policy.delay_for(self.failures)
    }

    pub fn on_success(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
