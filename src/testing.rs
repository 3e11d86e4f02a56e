//! Shared test fixtures and helpers.

use std::sync::Mutex;

use httpmock::MockServer;
use serde_json::{json, Value};

use crate::api::ApiClient;
use crate::config::TokenStore;
use crate::notify::{Notification, Notifier, NotifyLevel};
use crate::types::{Lead, LeadState, PendingResponse, PendingStatus};

pub fn sample_lead(phone: &str, name: &str) -> Lead {
    Lead {
        phone: phone.to_string(),
        name: name.to_string(),
        state: LeadState::Qualifying,
        email: None,
        company_name: None,
        business_segment: None,
        is_qualified: false,
        seller_id: None,
        channel_id: None,
        channel_name: None,
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
        last_interaction: "2026-01-01T00:00:00Z".to_string(),
        followup_count: None,
        source: None,
        handoff_requested: false,
        disqualification_reason: None,
    }
}

pub fn lead_json(phone: &str, name: &str) -> Value {
    json!({
        "phone": phone,
        "name": name,
        "state": "qualifying",
        "is_qualified": false,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z",
        "last_interaction": "2026-01-01T00:00:00Z"
    })
}

pub fn sample_pending(id: &str, phone: &str) -> PendingResponse {
    PendingResponse {
        id: id.to_string(),
        lead_id: format!("lead-{id}"),
        lead_name: "Ana".to_string(),
        lead_phone: phone.to_string(),
        lead_channel_id: None,
        user_message: "oi".to_string(),
        ai_response: "olá!".to_string(),
        edited_response: None,
        agent_used: "qualifier".to_string(),
        lead_state: "qualifying".to_string(),
        status: PendingStatus::Pending,
        reviewed_by: None,
        created_at: "2026-01-01T00:00:00Z".to_string(),
        reviewed_at: None,
    }
}

pub fn pending_json(id: &str, phone: &str, ai_response: &str) -> Value {
    json!({
        "id": id,
        "lead_id": format!("lead-{id}"),
        "lead_name": "Ana",
        "lead_phone": phone,
        "user_message": "oi",
        "ai_response": ai_response,
        "agent_used": "qualifier",
        "lead_state": "qualifying",
        "status": "pending",
        "created_at": "2026-01-01T00:00:00Z"
    })
}

pub fn stats_json() -> Value {
    json!({
        "total_leads": 10,
        "qualified_leads": 4,
        "scheduled_meetings": 2,
        "pending_responses": 1,
        "by_state": { "qualifying": 3 },
        "qualification_rate": 0.4,
        "scheduling_rate": 0.2
    })
}

/// Client pointed at a mock server with a token already in place.
pub fn mock_api(server: &MockServer) -> ApiClient {
    let tokens = TokenStore::default();
    tokens.set("test-token");
    ApiClient::new(server.base_url(), tokens)
}

/// Notifier that records everything it is asked to show.
#[derive(Default)]
pub struct CollectingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .expect("notifier lock poisoned")
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }

    pub fn count_of(&self, level: NotifyLevel) -> usize {
        self.notifications
            .lock()
            .expect("notifier lock poisoned")
            .iter()
            .filter(|n| n.level == level)
            .count()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .expect("notifier lock poisoned")
            .push(notification);
    }
}
