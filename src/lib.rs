//! Real-time synchronization engine for a conversational-sales review console.
//!
//! The backend pushes events over a single live connection; this crate
//! consumes that stream, reconciles it against locally cached domain state
//! (leads, the open conversation, pending AI replies awaiting review), and
//! falls back to polling whenever the stream is down, so a rendering layer
//! on top never diverges from server truth for more than one reconciliation
//! cycle.
//!
//! # Architecture
//!
//! - `channel`: the push connection — lifecycle, line framing, fixed-delay
//!   reconnect
//! - `dispatch`: maps decoded events to store mutations
//! - `store`: leads and chat caches, the single source of truth for views
//! - `poller`: periodic refetch, active only while the channel is down
//! - `engine`: composition root — one consumer task owns the stores, the
//!   channel and poller feed it, and a watch channel publishes snapshots
//! - `api`: typed client for the REST contract
//! - `notify`: the success/info/error notification surface
//!
//! Nothing here is fatal: transport drops recover automatically, malformed
//! events are discarded, and failed background refetches leave the previous
//! (stale but consistent) cache in place.

pub mod api;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod notify;
pub mod poller;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;

pub use api::{ApiClient, ApiError};
pub use channel::{ChannelState, EventChannel};
pub use config::{SyncConfig, TokenStore};
pub use engine::{EngineError, SyncEngine, SyncSnapshot};
pub use events::ServerEvent;
pub use notify::{LogNotifier, Notification, Notifier, NotifyLevel};
pub use types::{
    ConversationMessage, Lead, LeadState, PendingResponse, PendingStatus, ReviewAction,
    ReviewPayload, Sender, Stats,
};
