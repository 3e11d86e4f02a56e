//! Engine configuration and session-token storage.

use std::sync::{Arc, RwLock};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the console backend, e.g. `https://console.example.com`.
    pub base_url: String,
    /// Interval between fallback poll ticks while the push channel is down.
    pub poll_interval: Duration,
    /// Fixed delay before a reconnection attempt after a transport failure.
    pub reconnect_delay: Duration,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Build a config from `LEADSYNC_API_URL` plus optional `LEADSYNC_POLL_MS`
    /// and `LEADSYNC_RECONNECT_MS` overrides.
    pub fn from_env() -> Result<Self, String> {
        let base_url = std::env::var("LEADSYNC_API_URL")
            .map_err(|_| "LEADSYNC_API_URL is not set".to_string())?;
        if base_url.trim().is_empty() {
            return Err("LEADSYNC_API_URL is empty".to_string());
        }

        let mut config = Self::new(base_url.trim());
        if let Some(ms) = duration_from_env("LEADSYNC_POLL_MS")? {
            config.poll_interval = ms;
        }
        if let Some(ms) = duration_from_env("LEADSYNC_RECONNECT_MS")? {
            config.reconnect_delay = ms;
        }
        Ok(config)
    }
}

fn duration_from_env(key: &str) -> Result<Option<Duration>, String> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    let ms: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{key} must be an integer millisecond count, got '{raw}'"))?;
    Ok(Some(Duration::from_millis(ms)))
}

/// Shared cell holding the opaque session token.
///
/// Token presence is the sole gate for whether the event channel and the
/// fallback poller may run at all. The channel re-reads the token at each
/// reconnection attempt, so clearing it during the reconnect delay cancels
/// the retry.
#[derive(Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().expect("token store lock poisoned") = Some(token.into());
    }

    pub fn clear(&self) {
        *self.inner.write().expect("token store lock poisoned") = None;
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().expect("token store lock poisoned").clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .expect("token store lock poisoned")
            .is_some()
    }
}
