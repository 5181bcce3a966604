use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

pub const STOP_FILE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Signal,
    StopFile,
    Deadline,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Signal => "interrupt signal",
            StopReason::StopFile => "stop file",
            StopReason::Deadline => "deadline reached",
        };
        f.write_str(text)
    }
}

/// Run-wide cancellation flag.
///
/// Every clone observes the same state. The first reason passed to
/// [`CancelToken::cancel`] sticks; later calls are ignored, so the flag is
/// monotonic for the lifetime of a run.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns `true` if this call was the one that cancelled the run.
    pub fn cancel(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.tx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the token has been cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close underneath us
        let _ = rx.wait_for(|reason| reason.is_some()).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Background tasks that feed a [`CancelToken`]. Aborted on drop.
#[derive(Default)]
pub struct Watchers {
    handles: Vec<JoinHandle<()>>,
}

impl Watchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(&mut self, token: CancelToken, at: Instant) {
        self.handles.push(tokio::spawn(async move {
            tokio::select! {
                _ = sleep_until(at) => {
                    token.cancel(StopReason::Deadline);
                }
                _ = token.cancelled() => {}
            }
        }));
    }

    pub fn stop_file(&mut self, token: CancelToken, path: PathBuf, every: Duration) {
        self.handles.push(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if path.exists() {
                            debug!("stop file {:?} appeared", path);
                            token.cancel(StopReason::StopFile);
                            return;
                        }
                    }
                    _ = token.cancelled() => return,
                }
            }
        }));
    }

    /// Routes SIGINT and SIGTERM (Ctrl-C elsewhere) into the token.
    pub fn signals(&mut self, token: CancelToken) {
        self.handles.push(tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => {
                    debug!("shutdown signal received");
                    token.cancel(StopReason::Signal);
                }
                Err(err) => warn!("failed to listen for shutdown signals: {err}"),
            }
        }));
    }
}

impl Drop for Watchers {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
