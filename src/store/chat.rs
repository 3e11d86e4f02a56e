use chrono::Utc;

use crate::api::{ApiClient, ApiError};
use crate::types::{
    ConversationMessage, PendingResponse, PendingStatus, ReviewAction, ReviewPayload, Sender,
};

/// Cache of the open conversation's message log, the pending-review set, and
/// the "agent is composing" indicator.
#[derive(Debug, Default)]
pub struct ChatStore {
    conversations: Vec<ConversationMessage>,
    pending: Vec<PendingResponse>,
    is_typing: bool,
}

impl ChatStore {
    pub fn conversations(&self) -> &[ConversationMessage] {
        &self.conversations
    }

    pub fn pending(&self) -> &[PendingResponse] {
        &self.pending
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.is_typing = typing;
    }

    /// Forget everything tied to the previously open conversation.
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.pending.clear();
        self.is_typing = false;
    }

    /// Replace the message log with the server's view of one lead's
    /// conversation. Wholesale replacement: a different lead's log is
    /// unrelated data, never merged.
    pub async fn refresh_chat(&mut self, api: &ApiClient, phone: &str) {
        match api.conversations(phone).await {
            Ok(conversations) => self.conversations = conversations,
            Err(e) => tracing::debug!("conversation refresh failed for {phone}: {e}"),
        }
    }

    /// Replace the pending set with the actionable items for one lead (or all
    /// leads when `phone` is None).
    pub async fn refresh_pending(&mut self, api: &ApiClient, phone: Option<&str>) {
        match api.pending(phone, Some("pending")).await {
            Ok(pending) => self.pending = pending,
            Err(e) => tracing::debug!("pending refresh failed: {e}"),
        }
    }

    /// Merge the server's full pending list into the local set, additive by
    /// id. Push-delivered items may not be visible to a poll yet (replica or
    /// timing lag), so the local list is never wholesale discarded: the
    /// server is authoritative per-id only.
    pub async fn refresh_all_pending(&mut self, api: &ApiClient) {
        match api.pending(None, Some("pending")).await {
            Ok(fetched) => {
                for item in fetched {
                    self.upsert_pending(item);
                }
            }
            Err(e) => tracing::debug!("pending refresh failed: {e}"),
        }
    }

    /// Send a message as the human reviewer. On success the message is
    /// appended locally right away; the server echoes it back through the
    /// event stream for other sessions.
    pub async fn send_message(
        &mut self,
        api: &ApiClient,
        phone: &str,
        message: &str,
    ) -> Result<(), ApiError> {
        self.is_typing = true;
        match api.send_message(phone, message).await {
            Ok(()) => {
                self.push_message(ConversationMessage {
                    sender: Sender::User,
                    message: message.to_string(),
                    agent_name: String::new(),
                    timestamp: Utc::now().to_rfc3339(),
                    state: None,
                });
                Ok(())
            }
            Err(e) => {
                self.is_typing = false;
                Err(e)
            }
        }
    }

    /// Disposition a pending response. Rejection keeps the item visible with
    /// its status flipped; approval and edit remove it from the pending set
    /// (the text becomes a regular message server-side).
    pub async fn review_pending(
        &mut self,
        api: &ApiClient,
        pending_id: &str,
        payload: &ReviewPayload,
    ) -> Result<(), ApiError> {
        api.review_pending(pending_id, payload).await?;
        match payload.action {
            ReviewAction::Reject => {
                self.set_pending_status(pending_id, PendingStatus::Rejected);
            }
            ReviewAction::Approve | ReviewAction::Edit => {
                self.pending.retain(|p| p.id != pending_id);
            }
        }
        Ok(())
    }

    pub fn push_message(&mut self, message: ConversationMessage) {
        self.conversations.push(message);
    }

    /// Insert or replace a pending item by id. The most recently observed
    /// object for a given id wins.
    pub fn upsert_pending(&mut self, item: PendingResponse) {
        self.pending.retain(|p| p.id != item.id);
        self.pending.push(item);
    }

    pub fn remove_pending(&mut self, pending_id: &str) {
        self.pending.retain(|p| p.id != pending_id);
    }

    /// Flip the status of a known pending item in place. Returns false when
    /// the id is unknown (already removed or never seen).
    pub fn set_pending_status(&mut self, pending_id: &str, status: PendingStatus) -> bool {
        match self.pending.iter_mut().find(|p| p.id == pending_id) {
            Some(item) => {
                item.status = status;
                true
            }
            None => false,
        }
    }
}
