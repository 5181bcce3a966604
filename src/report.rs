use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;
use serde::Serialize;
use tokio::time::{Duration, Instant};
use url::Url;

use crate::burn::{FailureKind, FetchError, OutputMode, RunConfig, RunSummary, StatusSnapshot};
use crate::cancel::StopReason;
use crate::util::format_bytes;

/// Writes the console interface: start line, periodic stats, warnings and the
/// final summary. Quiet mode keeps only the stop and done output; fetch
/// failures still go to the log as warnings.
pub struct StatusReporter {
    mode: OutputMode,
    interval: Duration,
    last_emit: Instant,
}

impl StatusReporter {
    pub fn new(mode: OutputMode, interval: Duration, started_at: Instant) -> Self {
        Self {
            mode,
            interval,
            last_emit: started_at,
        }
    }

    pub fn start(&mut self, config: &RunConfig) {
        match self.mode {
            OutputMode::Quiet => {}
            OutputMode::Text => emit_line(&start_line(config)),
            OutputMode::Json => emit_json(&JsonEvent::Start {
                rate_bytes_per_sec: config.rate_bytes_per_sec,
                duration_secs: config.duration.as_secs_f64(),
                chunk_size: config.chunk_size,
                sources: config.sources.len(),
            }),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_emit) >= self.interval
    }

    pub fn status(&mut self, snapshot: &StatusSnapshot, now: Instant) {
        self.last_emit = now;
        match self.mode {
            OutputMode::Quiet => {}
            OutputMode::Text => emit_line(&status_line(snapshot)),
            OutputMode::Json => emit_json(&JsonEvent::Stat {
                elapsed_secs: snapshot.elapsed.as_secs_f64(),
                remaining_secs: snapshot.remaining.as_secs_f64(),
                bytes_total: snapshot.bytes_total,
                bytes_per_second: snapshot.speed,
            }),
        }
    }

    pub fn source_failed(&mut self, url: &Url, err: &FetchError, backoff: Duration) {
        match self.mode {
            OutputMode::Quiet => warn!("{}", failure_line(url, err, backoff)),
            OutputMode::Text => emit_line(&format!("[warn] {}", failure_line(url, err, backoff))),
            OutputMode::Json => emit_json(&JsonEvent::Warn {
                source: url.as_str(),
                kind: err.kind(),
                error: err.to_string(),
                backoff_secs: backoff.as_secs_f64(),
            }),
        }
    }

    pub fn finish(&mut self, summary: &RunSummary, stop_file: Option<&Path>) {
        let stopped_by_file = summary.reason == StopReason::StopFile;
        match self.mode {
            OutputMode::Quiet | OutputMode::Text => {
                if stopped_by_file {
                    if let Some(path) = stop_file {
                        emit_line(&format!("[stop] stop file detected: {}", path.display()));
                    }
                }
                emit_line(&summary_block(summary));
            }
            OutputMode::Json => {
                if stopped_by_file {
                    emit_json(&JsonEvent::Stop {
                        stop_file: stop_file.map(|p| p.display().to_string()),
                    });
                }
                emit_json(&JsonEvent::Done {
                    reason: summary.reason,
                    bytes_total: summary.bytes_total,
                    elapsed_secs: summary.elapsed_secs(),
                    bytes_per_second: summary.average_rate(),
                    attempts: summary.attempts,
                    failures: summary.failures,
                });
            }
        }
    }
}

pub fn start_line(config: &RunConfig) -> String {
    format!(
        "[start] rate={:.3} MB/s ({}/s), duration={:.3} h, chunk={} KB",
        config.rate_mib(),
        format_bytes(config.rate_bytes_per_sec as u64),
        config.duration_hours(),
        config.chunk_kib()
    )
}

pub fn failure_line(url: &Url, err: &FetchError, backoff: Duration) -> String {
    format!(
        "source failed: {url} ({err}), retry in {}s",
        backoff.as_secs_f64()
    )
}

pub fn status_line(snapshot: &StatusSnapshot) -> String {
    format!(
        "[stat] elapsed={:.1}s remain={:.1}s used={} speed≈{}/s",
        snapshot.elapsed.as_secs_f64(),
        snapshot.remaining.as_secs_f64(),
        format_bytes(snapshot.bytes_total),
        format_bytes(snapshot.speed.round() as u64)
    )
}

pub fn summary_block(summary: &RunSummary) -> String {
    format!(
        "\n[done]\n  total used: {}\n  total time: {:.1}s\n  avg speed : {}/s\n  attempts  : {} ({} failed)",
        format_bytes(summary.bytes_total),
        summary.elapsed_secs(),
        format_bytes(summary.average_rate().round() as u64),
        summary.attempts,
        summary.failures
    )
}

fn emit_line(line: &str) {
    println!("{line}");
    let _ = std::io::stdout().flush();
}

fn emit_json(event: &JsonEvent<'_>) {
    let envelope = JsonEnvelope {
        timestamp_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
        event,
    };
    if let Ok(serialized) = serde_json::to_string(&envelope) {
        emit_line(&serialized);
    }
}

#[derive(Serialize)]
struct JsonEnvelope<'a> {
    timestamp_ms: u128,
    #[serde(flatten)]
    event: &'a JsonEvent<'a>,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Start {
        rate_bytes_per_sec: f64,
        duration_secs: f64,
        chunk_size: usize,
        sources: usize,
    },
    Stat {
        elapsed_secs: f64,
        remaining_secs: f64,
        bytes_total: u64,
        bytes_per_second: f64,
    },
    Warn {
        source: &'a str,
        kind: FailureKind,
        error: String,
        backoff_secs: f64,
    },
    Stop {
        stop_file: Option<String>,
    },
    Done {
        reason: StopReason,
        bytes_total: u64,
        elapsed_secs: f64,
        bytes_per_second: f64,
        attempts: u64,
        failures: u64,
    },
}
