use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use log::debug;
use reqwest::Client;
use tokio::time::{timeout, Duration};
use url::Url;

use crate::burn::manager::RunState;
use crate::burn::retry::FetchError;
use crate::burn::RunConfig;

const USER_AGENT: &str = concat!("trafficburn/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;
// initial buffer capacity; larger chunks grow on demand
const INITIAL_BUFFER: usize = 64 * 1024;

/// Opens one streaming GET per attempt and drains it through the run state.
pub struct FetchDriver {
    client: Client,
    chunk_size: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl FetchDriver {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .tcp_nodelay(true)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            chunk_size: config.chunk_size.max(1),
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
        })
    }

    /// Streams `url` until it is exhausted or the run is told to stop.
    ///
    /// Stopping early is not an error. The response is dropped, and its
    /// connection released, on every return path.
    pub async fn drain(&self, url: &Url, state: &mut RunState) -> Result<(), FetchError> {
        let head_timeout = self.connect_timeout + self.read_timeout;
        let request = self.client.get(url.clone()).send();
        let response = tokio::select! {
            biased;
            _ = state.cancel.cancelled() => return Ok(()),
            result = timeout(head_timeout, request) => match result {
                Err(_) => {
                    return Err(FetchError::Timeout {
                        phase: "response",
                        after: head_timeout,
                    })
                }
                Ok(Err(err)) => return Err(FetchError::from_request(err, self.connect_timeout)),
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FetchError::Status {
                status,
                url: url.clone(),
            });
        }
        debug!(
            "streaming {} (status {}, length {:?})",
            response.url(),
            status,
            response.content_length()
        );

        let mut body = ChunkedBody::new(response.bytes_stream(), self.chunk_size);
        loop {
            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => break,
                next = body.next_chunk(self.read_timeout) => next?,
            };
            let Some(chunk) = next else {
                break;
            };
            if chunk.is_empty() {
                continue;
            }
            if state.check_stop() {
                break;
            }

            state.limiter.consume(chunk.len(), &state.cancel).await;
            state.record_chunk(chunk.len());
        }
        Ok(())
    }
}

/// Regroups a body stream into chunks of exactly `chunk_size` bytes; only the
/// final chunk may be shorter.
struct ChunkedBody<S> {
    inner: S,
    buffer: BytesMut,
    chunk_size: usize,
    exhausted: bool,
}

impl<S> ChunkedBody<S>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    fn new(inner: S, chunk_size: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(chunk_size.min(INITIAL_BUFFER)),
            chunk_size,
            exhausted: false,
        }
    }

    /// `read_timeout` bounds each individual read from the connection.
    async fn next_chunk(&mut self, read_timeout: Duration) -> Result<Option<Bytes>, FetchError> {
        while !self.exhausted && self.buffer.len() < self.chunk_size {
            match timeout(read_timeout, self.inner.next()).await {
                Err(_) => {
                    return Err(FetchError::Timeout {
                        phase: "read",
                        after: read_timeout,
                    })
                }
                Ok(Some(Ok(bytes))) => self.buffer.extend_from_slice(&bytes),
                Ok(Some(Err(err))) => return Err(FetchError::Stream(err)),
                Ok(None) => self.exhausted = true,
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }
        let take = self.buffer.len().min(self.chunk_size);
        Ok(Some(self.buffer.split_to(take).freeze()))
    }
}
