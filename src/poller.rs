//! Fallback poller: approximates push delivery while the channel is down.
//!
//! The task never touches the stores itself; it publishes ticks to the
//! engine's consumer loop, which performs the refetches as ordinary turns.
//! A tick is only produced while connectivity reads disconnected and a
//! session token exists, and a scheduled tick dies the moment connectivity
//! comes back.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::TokenStore;

pub fn spawn(
    interval: Duration,
    tokens: TokenStore,
    mut connected: watch::Receiver<bool>,
    ticks: mpsc::Sender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *connected.borrow() {
                // Healthy push connection: sleep until connectivity changes.
                if connected.changed().await.is_err() {
                    break;
                }
                continue;
            }

            tokio::select! {
                changed = connected.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = time::sleep(interval) => {
                    if !tokens.is_set() {
                        continue;
                    }
                    if ticks.send(()).await.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("fallback poller stopped");
    })
}
