//! Push-event payloads.
//!
//! Each message on the live stream is a UTF-8 JSON object with at least a
//! `type` discriminant. The set below is closed over the kinds the dispatcher
//! acts on; anything else lands in [`ServerEvent::Unknown`] so that new server
//! event kinds never break an already-deployed client.

use serde::Deserialize;

use crate::types::Sender;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Liveness acknowledgment sent right after the stream opens. No-op.
    Connected,
    /// The AI drafted a reply for a lead; it now awaits human review.
    PendingResponse {
        #[serde(default)]
        pending_id: String,
        #[serde(default)]
        lead_id: String,
        #[serde(default)]
        lead_name: String,
        #[serde(default)]
        phone: String,
        #[serde(default)]
        user_message: String,
        #[serde(default)]
        ai_response: String,
        #[serde(default)]
        agent_used: String,
        #[serde(default)]
        lead_state: String,
    },
    /// A reviewer (possibly on another session) dispositioned a pending reply.
    /// `action` is past tense: "approved", "rejected", or "edited".
    ResponseReviewed {
        pending_id: String,
        action: String,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        response: Option<String>,
    },
    NewMessage {
        phone: String,
        sender: Sender,
        message: String,
        #[serde(default)]
        agent_used: String,
    },
    NewLead,
    LeadDeleted {
        phone: String,
    },
    LeadUpdated {
        phone: String,
    },
    MeetingBooked {
        phone: String,
        #[serde(default)]
        teams_join_url: Option<String>,
    },
    ProcessingError {
        phone: String,
        error: String,
    },
    #[serde(other)]
    Unknown,
}
