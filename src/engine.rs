//! Composition root: wires the channel, dispatcher, stores, and poller.
//!
//! All store mutation happens on one consumer task. The event channel and
//! the fallback poller are independent producers feeding that task through
//! channels, and user actions travel the same road, so no two mutations can
//! ever interleave. Each processed turn publishes a fresh [`SyncSnapshot`]
//! on a watch channel for consumers to render from — views stay agnostic to
//! which delivery path produced an update.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError};
use crate::channel::EventChannel;
use crate::config::{SyncConfig, TokenStore};
use crate::dispatch::Dispatcher;
use crate::notify::{Notification, Notifier};
use crate::poller;
use crate::store::{ChatStore, LeadsStore};
use crate::types::{
    ConversationMessage, Lead, PendingResponse, ReviewAction, ReviewPayload, Stats,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("sync engine stopped")]
    Stopped,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Immutable view of the cached state as of the last processed turn.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    pub connected: bool,
    pub leads: Vec<Lead>,
    pub selected_phone: Option<String>,
    pub selected_lead: Option<Lead>,
    pub stats: Option<Stats>,
    pub conversations: Vec<ConversationMessage>,
    pub pending: Vec<PendingResponse>,
    pub is_typing: bool,
}

enum Command {
    Bootstrap {
        reply: oneshot::Sender<()>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    SelectLead {
        phone: Option<String>,
        reply: oneshot::Sender<()>,
    },
    SendMessage {
        phone: String,
        message: String,
        reply: oneshot::Sender<Result<(), ApiError>>,
    },
    Review {
        pending_id: String,
        payload: ReviewPayload,
        reply: oneshot::Sender<Result<(), ApiError>>,
    },
    DeleteLead {
        phone: String,
        reply: oneshot::Sender<Result<(), ApiError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

pub struct SyncEngine {
    cmd_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<SyncSnapshot>,
    channel: Arc<EventChannel>,
    tokens: TokenStore,
    consumer: JoinHandle<()>,
    poller: JoinHandle<()>,
}

impl SyncEngine {
    /// Construct the engine and start its background tasks. Nothing talks to
    /// the backend until a session token is provided.
    pub fn start(config: SyncConfig, notifier: Arc<dyn Notifier>) -> Self {
        let tokens = TokenStore::default();
        let api = Arc::new(ApiClient::new(config.base_url.clone(), tokens.clone()));

        let (event_tx, event_rx) = mpsc::channel(256);
        let channel = EventChannel::new(
            config.base_url.clone(),
            tokens.clone(),
            config.reconnect_delay,
            event_tx,
        );

        let (tick_tx, tick_rx) = mpsc::channel(1);
        let poller = poller::spawn(
            config.poll_interval,
            tokens.clone(),
            channel.connectivity(),
            tick_tx,
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(SyncSnapshot::default());
        let consumer = tokio::spawn(consumer_loop(
            api,
            notifier,
            channel.connectivity(),
            cmd_rx,
            event_rx,
            tick_rx,
            snapshot_tx,
        ));

        Self {
            cmd_tx,
            snapshot_rx,
            channel,
            tokens,
            consumer,
            poller,
        }
    }

    /// Store the session token, open the push channel, and prime the caches.
    pub async fn set_session(&self, token: &str) -> Result<(), EngineError> {
        self.tokens.set(token);
        self.channel.connect(token);
        let (reply, rx) = oneshot::channel();
        self.send(Command::Bootstrap { reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// End the session: wipe the token, close the channel (cancelling any
    /// reconnect timer), stop polling, and reset both stores.
    pub async fn clear_session(&self) -> Result<(), EngineError> {
        self.tokens.clear();
        self.channel.disconnect();
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Refetch the lead list, stats, and pending set on demand, the same
    /// turn that runs after login.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Bootstrap { reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.channel.connectivity().borrow()
    }

    /// Open (or close, with `None`) a conversation. Selecting clears the
    /// previous detail and log immediately, then loads the lead's detail,
    /// message log, and scoped pending items. Load failures leave the
    /// cleared state; they are not surfaced.
    pub async fn select_lead(&self, phone: Option<String>) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SelectLead { phone, reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn send_message(&self, phone: &str, message: &str) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SendMessage {
            phone: phone.to_string(),
            message: message.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::Stopped)?.map_err(Into::into)
    }

    pub async fn review_response(
        &self,
        pending_id: &str,
        payload: ReviewPayload,
    ) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Review {
            pending_id: pending_id.to_string(),
            payload,
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::Stopped)?.map_err(Into::into)
    }

    pub async fn delete_lead(&self, phone: &str) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::DeleteLead {
            phone: phone.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::Stopped)?.map_err(Into::into)
    }

    /// Tear down all background tasks. Equivalent to logout plus dropping
    /// the engine.
    pub async fn shutdown(self) {
        self.tokens.clear();
        self.channel.disconnect();
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
        self.poller.abort();
        let _ = self.consumer.await;
    }

    async fn send(&self, command: Command) -> Result<(), EngineError> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| EngineError::Stopped)
    }
}

#[allow(clippy::too_many_arguments)]
async fn consumer_loop(
    api: Arc<ApiClient>,
    notifier: Arc<dyn Notifier>,
    mut connected: watch::Receiver<bool>,
    mut cmd_rx: mpsc::Receiver<Command>,
    mut event_rx: mpsc::Receiver<String>,
    mut tick_rx: mpsc::Receiver<()>,
    snapshot_tx: watch::Sender<SyncSnapshot>,
) {
    let dispatcher = Dispatcher::new(api.clone(), notifier.clone());
    let mut leads = LeadsStore::default();
    let mut chat = ChatStore::default();
    let mut connectivity_open = true;

    loop {
        tokio::select! {
            command = cmd_rx.recv() => {
                let Some(command) = command else { break };
                let stop = handle_command(
                    command, &api, &notifier, &mut leads, &mut chat,
                    &snapshot_tx, &connected,
                ).await;
                if stop {
                    break;
                }
            }
            Some(raw) = event_rx.recv() => {
                dispatcher.dispatch_raw(&raw, &mut leads, &mut chat).await;
            }
            Some(()) = tick_rx.recv() => {
                leads.refresh_leads(&api).await;
                if let Some(phone) = leads.selected_phone().map(str::to_string) {
                    chat.refresh_pending(&api, Some(&phone)).await;
                }
            }
            changed = connected.changed(), if connectivity_open => {
                if changed.is_err() {
                    connectivity_open = false;
                }
            }
        }
        publish(&snapshot_tx, &leads, &chat, *connected.borrow());
    }
    tracing::debug!("sync consumer stopped");
}

fn publish(
    snapshot_tx: &watch::Sender<SyncSnapshot>,
    leads: &LeadsStore,
    chat: &ChatStore,
    connected: bool,
) {
    snapshot_tx.send_replace(SyncSnapshot {
        connected,
        leads: leads.leads().to_vec(),
        selected_phone: leads.selected_phone().map(str::to_string),
        selected_lead: leads.selected_lead().cloned(),
        stats: leads.stats().cloned(),
        conversations: chat.conversations().to_vec(),
        pending: chat.pending().to_vec(),
        is_typing: chat.is_typing(),
    });
}

/// Process one user command. Publishes a snapshot before answering so a
/// caller awaiting the reply observes the command's effects. Returns true
/// when the loop should stop.
#[allow(clippy::too_many_arguments)]
async fn handle_command(
    command: Command,
    api: &Arc<ApiClient>,
    notifier: &Arc<dyn Notifier>,
    leads: &mut LeadsStore,
    chat: &mut ChatStore,
    snapshot_tx: &watch::Sender<SyncSnapshot>,
    connected: &watch::Receiver<bool>,
) -> bool {
    match command {
        Command::Bootstrap { reply } => {
            leads.refresh_leads(api).await;
            leads.refresh_stats(api).await;
            chat.refresh_all_pending(api).await;
            publish(snapshot_tx, leads, chat, *connected.borrow());
            let _ = reply.send(());
        }
        Command::Reset { reply } => {
            *leads = LeadsStore::default();
            *chat = ChatStore::default();
            publish(snapshot_tx, leads, chat, *connected.borrow());
            let _ = reply.send(());
        }
        Command::SelectLead { phone, reply } => {
            chat.clear();
            leads.select_lead(api, phone.clone()).await;
            if let Some(phone) = phone {
                chat.refresh_chat(api, &phone).await;
                chat.refresh_pending(api, Some(&phone)).await;
            }
            publish(snapshot_tx, leads, chat, *connected.borrow());
            let _ = reply.send(());
        }
        Command::SendMessage {
            phone,
            message,
            reply,
        } => {
            let result = chat.send_message(api, &phone, &message).await;
            match &result {
                Ok(()) => notifier.notify(Notification::success("Message sent")),
                Err(e) => notifier
                    .notify(Notification::error("Message failed").with_body(e.to_string())),
            }
            publish(snapshot_tx, leads, chat, *connected.borrow());
            let _ = reply.send(result);
        }
        Command::Review {
            pending_id,
            payload,
            reply,
        } => {
            let lead_phone = chat
                .pending()
                .iter()
                .find(|p| p.id == pending_id)
                .map(|p| p.lead_phone.clone());
            let result = chat.review_pending(api, &pending_id, &payload).await;
            match &result {
                Ok(()) => {
                    // Approved or edited text becomes a regular message
                    // server-side; refetch the open conversation once.
                    if payload.action != ReviewAction::Reject {
                        if let Some(phone) = lead_phone {
                            if leads.is_selected(&phone) {
                                chat.refresh_chat(api, &phone).await;
                            }
                        }
                    }
                    notifier.notify(Notification::success(match payload.action {
                        ReviewAction::Approve => "Response approved",
                        ReviewAction::Reject => "Response rejected",
                        ReviewAction::Edit => "Response edited and sent",
                    }));
                }
                Err(e) => {
                    notifier
                        .notify(Notification::error("Review failed").with_body(e.to_string()));
                }
            }
            publish(snapshot_tx, leads, chat, *connected.borrow());
            let _ = reply.send(result);
        }
        Command::DeleteLead { phone, reply } => {
            let result = api.delete_lead(&phone).await;
            match &result {
                Ok(()) => {
                    if leads.remove_lead(&phone) {
                        chat.clear();
                    }
                    leads.refresh_leads(api).await;
                    leads.refresh_stats(api).await;
                    notifier.notify(Notification::success("Lead deleted"));
                }
                Err(e) => {
                    notifier
                        .notify(Notification::error("Delete failed").with_body(e.to_string()));
                }
            }
            publish(snapshot_tx, leads, chat, *connected.borrow());
            let _ = reply.send(result);
        }
        Command::Shutdown { reply } => {
            publish(snapshot_tx, leads, chat, *connected.borrow());
            let _ = reply.send(());
            return true;
        }
    }
    false
}
