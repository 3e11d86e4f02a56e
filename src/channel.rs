//! Server-push event channel.
//!
//! Owns at most one live connection to `/api/events`. Messages arrive as
//! `data:`-framed lines on a chunked byte stream and are forwarded raw to the
//! consumer; decoding happens in the dispatcher so a malformed payload can
//! never take the transport down.
//!
//! Lifecycle: `connect` replaces any prior connection, a transport failure
//! (or a server-closed stream) flips connectivity to disconnected and
//! schedules exactly one retry after a fixed delay, and `disconnect` tears
//! everything down including an in-flight retry timer. There is no backoff
//! and no retry cutoff: as long as a token is present at each attempt, the
//! channel keeps trying.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct EventChannel {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
    reconnect_delay: Duration,
    connected_tx: watch::Sender<bool>,
    events_tx: mpsc::Sender<String>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ChannelState,
    conn_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
    /// Bumped on every connect/disconnect so that handlers spawned for an
    /// older connection cannot mutate state for the current one.
    epoch: u64,
}

impl EventChannel {
    pub fn new(
        base_url: impl Into<String>,
        tokens: TokenStore,
        reconnect_delay: Duration,
        events_tx: mpsc::Sender<String>,
    ) -> Arc<Self> {
        let (connected_tx, _) = watch::channel(false);
        Arc::new(Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens,
            reconnect_delay,
            connected_tx,
            events_tx,
            inner: Mutex::new(Inner {
                state: ChannelState::Disconnected,
                conn_task: None,
                retry_task: None,
                epoch: 0,
            }),
        })
    }

    /// Receiver for the connectivity flag. Flips to true on transport open
    /// and to false on error, stream end, or `disconnect`.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().expect("channel lock poisoned").state
    }

    /// Open the event stream, closing and replacing any prior connection
    /// first. Repeated calls are safe.
    pub fn connect(self: &Arc<Self>, token: &str) {
        let url = format!(
            "{}/api/events?token={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(token)
        );

        let epoch = {
            let mut inner = self.inner.lock().expect("channel lock poisoned");
            if let Some(task) = inner.conn_task.take() {
                task.abort();
            }
            if let Some(task) = inner.retry_task.take() {
                task.abort();
            }
            inner.epoch += 1;
            inner.state = ChannelState::Connecting;
            inner.epoch
        };

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.run_connection(url, epoch).await;
        });

        let mut inner = self.inner.lock().expect("channel lock poisoned");
        if inner.epoch == epoch {
            inner.conn_task = Some(handle);
        } else {
            // A concurrent connect/disconnect superseded us already.
            handle.abort();
        }
    }

    /// Close the transport without scheduling a reconnect. Any pending retry
    /// timer is cancelled.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().expect("channel lock poisoned");
        inner.epoch += 1;
        if let Some(task) = inner.conn_task.take() {
            task.abort();
        }
        if let Some(task) = inner.retry_task.take() {
            task.abort();
        }
        inner.state = ChannelState::Disconnected;
        self.connected_tx.send_replace(false);
    }

    async fn run_connection(self: Arc<Self>, url: String, epoch: u64) {
        if let Err(e) = self.stream_events(&url, epoch).await {
            tracing::debug!("event stream failed: {e}");
        } else {
            tracing::debug!("event stream closed by server");
        }
        self.on_transport_closed(epoch);
    }

    async fn stream_events(&self, url: &str, epoch: u64) -> Result<(), String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("event stream rejected: {}", response.status()));
        }

        self.mark_connected(epoch);

        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::default();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| e.to_string())?;
            for line in buffer.push(&bytes) {
                self.forward_line(&line).await;
            }
        }

        Ok(())
    }

    async fn forward_line(&self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') || trimmed.starts_with("event:") {
            return;
        }
        let Some(payload) = trimmed.strip_prefix("data:").map(str::trim) else {
            return;
        };
        if payload.is_empty() {
            return;
        }
        if self.events_tx.send(payload.to_string()).await.is_err() {
            tracing::warn!("event consumer gone, dropping push payload");
        }
    }

    fn mark_connected(&self, epoch: u64) {
        let mut inner = self.inner.lock().expect("channel lock poisoned");
        if inner.epoch != epoch {
            return;
        }
        inner.state = ChannelState::Connected;
        self.connected_tx.send_replace(true);
    }

    /// Transport gone: flip to disconnected and schedule exactly one retry.
    /// The token is read fresh when the timer fires; no token, no retry.
    fn on_transport_closed(self: &Arc<Self>, epoch: u64) {
        let mut inner = self.inner.lock().expect("channel lock poisoned");
        if inner.epoch != epoch {
            return;
        }
        inner.state = ChannelState::Disconnected;
        inner.conn_task = None;
        self.connected_tx.send_replace(false);

        let this = Arc::clone(self);
        let delay = self.reconnect_delay;
        inner.retry_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(token) = this.tokens.get() else {
                tracing::debug!("session ended during reconnect delay, staying disconnected");
                return;
            };
            {
                let mut inner = this.inner.lock().expect("channel lock poisoned");
                if inner.epoch != epoch {
                    return;
                }
                // Detach ourselves so connect() does not abort the task
                // it is running on.
                inner.retry_task = None;
            }
            this.connect(&token);
        }));
    }
}

/// Accumulates raw transport bytes and yields complete lines.
///
/// The transport chunks on byte boundaries, so a multi-byte UTF-8 character
/// may be split across chunks; buffering bytes and decoding only whole lines
/// keeps such payloads intact. A line that still fails to decode is dropped,
/// never forwarded mangled.
#[derive(Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.bytes.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.bytes.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.bytes.drain(..=idx).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            match String::from_utf8(line) {
                Ok(line) => lines.push(line),
                Err(e) => tracing::debug!("discarding non-UTF-8 stream line: {e}"),
            }
        }
        lines
    }
}
