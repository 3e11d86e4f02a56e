//! Domain model shared by the stores, the dispatcher, and the API client.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Funnel state of a lead. The backend owns all transitions; this layer only
/// caches whatever state the server last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadState {
    New,
    Welcomed,
    Qualifying,
    Qualified,
    Scheduling,
    Scheduled,
    Disqualified,
    FollowupD1,
    FollowupD2,
    FollowupD3,
    FollowupD4,
    FollowupD5,
    FollowupD6,
    FollowupD7,
    NoResponse,
    Converted,
    Lost,
    HandoffRequested,
}

/// A prospective customer. The phone number is the natural key across the
/// whole synchronization layer; there is no surrogate id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub phone: String,
    pub name: String,
    pub state: LeadState,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub business_segment: Option<String>,
    #[serde(default)]
    pub is_qualified: bool,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_interaction: String,
    #[serde(default)]
    pub followup_count: Option<u32>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub handoff_requested: bool,
    #[serde(default)]
    pub disqualification_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
    System,
}

/// One entry in a lead's conversation log. The log held in memory always
/// belongs to exactly one lead at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub sender: Sender,
    pub message: String,
    #[serde(default)]
    pub agent_name: String,
    pub timestamp: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Approved,
    Rejected,
    Edited,
}

/// An AI-drafted reply awaiting human disposition, keyed by a server-issued id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResponse {
    pub id: String,
    #[serde(default)]
    pub lead_id: String,
    #[serde(default)]
    pub lead_name: String,
    pub lead_phone: String,
    #[serde(default)]
    pub lead_channel_id: Option<String>,
    #[serde(default)]
    pub user_message: String,
    pub ai_response: String,
    #[serde(default)]
    pub edited_response: Option<String>,
    #[serde(default)]
    pub agent_used: String,
    #[serde(default)]
    pub lead_state: String,
    pub status: PendingStatus,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub reviewed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
    Edit,
}

/// Body of `POST /api/pending/{id}/review`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub action: ReviewAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl ReviewPayload {
    pub fn new(action: ReviewAction) -> Self {
        Self {
            action,
            edited_response: None,
            rating: None,
            approval_reason: None,
            rejection_reason: None,
            ideal_response: None,
            channel_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_leads: u64,
    pub qualified_leads: u64,
    pub scheduled_meetings: u64,
    pub pending_responses: u64,
    #[serde(default)]
    pub by_state: HashMap<String, u64>,
    pub qualification_rate: f64,
    pub scheduling_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_state_round_trips_snake_case() {
        let json = "\"followup_d3\"";
        let state: LeadState = serde_json::from_str(json).unwrap();
        assert_eq!(state, LeadState::FollowupD3);
        assert_eq!(serde_json::to_string(&state).unwrap(), json);
    }

    #[test]
    fn lead_tolerates_missing_optional_fields() {
        let lead: Lead = serde_json::from_str(
            r#"{
                "phone": "+5511999999999",
                "name": "Ana",
                "state": "qualifying",
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:00:00Z",
                "last_interaction": "2026-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(lead.state, LeadState::Qualifying);
        assert!(!lead.is_qualified);
        assert_eq!(lead.email, None);
    }

    #[test]
    fn review_payload_omits_unset_fields() {
        let body = serde_json::to_value(ReviewPayload::new(ReviewAction::Approve)).unwrap();
        assert_eq!(body, serde_json::json!({ "action": "approve" }));

        let mut edit = ReviewPayload::new(ReviewAction::Edit);
        edit.edited_response = Some("better text".to_string());
        let body = serde_json::to_value(edit).unwrap();
        assert_eq!(body["action"], "edit");
        assert_eq!(body["edited_response"], "better text");
    }
}
