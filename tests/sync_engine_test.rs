//! End-to-end engine test against a mock backend: push delivery, selection,
//! optimistic send, review, and session teardown through the public API.

use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use tokio::time::timeout;

use leadsync::engine::SyncSnapshot;
use leadsync::{LogNotifier, ReviewAction, ReviewPayload, SyncConfig, SyncEngine};

const PHONE: &str = "5511999999999";

fn lead_json() -> serde_json::Value {
    json!({
        "phone": PHONE,
        "name": "Ana",
        "state": "qualifying",
        "is_qualified": false,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z",
        "last_interaction": "2026-01-01T00:00:00Z"
    })
}

fn pending_json() -> serde_json::Value {
    json!({
        "id": "p1",
        "lead_id": "lead-p1",
        "lead_name": "Ana",
        "lead_phone": PHONE,
        "user_message": "oi",
        "ai_response": "olá!",
        "agent_used": "qualifier",
        "lead_state": "qualifying",
        "status": "pending",
        "created_at": "2026-01-01T00:00:00Z"
    })
}

fn mock_backend(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/api/events").query_param("token", "tok");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(format!(
                "data: {{\"type\": \"connected\"}}\n\ndata: {}\n\n",
                json!({
                    "type": "pending_response",
                    "pending_id": "p1",
                    "lead_id": "lead-p1",
                    "lead_name": "Ana",
                    "phone": PHONE,
                    "user_message": "oi",
                    "ai_response": "olá!",
                    "agent_used": "qualifier",
                    "lead_state": "qualifying"
                })
            ));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/leads");
        then.status(200).json_body(json!([lead_json()]));
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("/api/leads/{PHONE}"));
        then.status(200).json_body(lead_json());
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/api/leads/{PHONE}/conversations"));
        then.status(200).json_body(json!([
            {
                "sender": "user",
                "message": "oi",
                "agent_name": "",
                "timestamp": "2026-01-01T00:00:00Z"
            },
            {
                "sender": "agent",
                "message": "olá!",
                "agent_name": "qualifier",
                "timestamp": "2026-01-01T00:00:01Z"
            }
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/pending");
        then.status(200).json_body(json!([pending_json()]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/stats");
        then.status(200).json_body(json!({
            "total_leads": 1,
            "qualified_leads": 0,
            "scheduled_meetings": 0,
            "pending_responses": 1,
            "by_state": { "qualifying": 1 },
            "qualification_rate": 0.0,
            "scheduling_rate": 0.0
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/messages");
        then.status(200).json_body(json!({ "ok": true }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/pending/p1/review");
        then.status(200).json_body(json!({ "ok": true }));
    });
}

fn engine_config(server: &MockServer) -> SyncConfig {
    let mut config = SyncConfig::new(server.base_url());
    // Long enough that neither timer interferes with the assertions.
    config.poll_interval = Duration::from_secs(60);
    config.reconnect_delay = Duration::from_secs(60);
    config
}

async fn wait_for<F>(engine: &SyncEngine, what: &str, predicate: F) -> SyncSnapshot
where
    F: Fn(&SyncSnapshot) -> bool,
{
    let mut rx = engine.subscribe();
    timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow();
                if predicate(&snapshot) {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("engine stopped while waiting for: {what}");
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for: {what}"))
}

#[tokio::test]
async fn full_session_flow() {
    let server = MockServer::start();
    mock_backend(&server);

    let engine = SyncEngine::start(engine_config(&server), Arc::new(LogNotifier));
    engine.set_session("tok").await.unwrap();

    // Bootstrap plus the push-delivered pending item converge on one entry.
    let snapshot = wait_for(&engine, "lead list and pending set", |s| {
        !s.leads.is_empty() && s.pending.iter().any(|p| p.id == "p1")
    })
    .await;
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.leads[0].phone, PHONE);
    assert!(snapshot.stats.is_some());

    // Opening the conversation loads detail, log, and scoped pending items.
    engine.select_lead(Some(PHONE.to_string())).await.unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.selected_phone.as_deref(), Some(PHONE));
    assert_eq!(snapshot.selected_lead.as_ref().unwrap().name, "Ana");
    assert_eq!(snapshot.conversations.len(), 2);
    assert_eq!(snapshot.pending.len(), 1);

    // Optimistic send: appended locally, composing indicator up.
    engine.send_message(PHONE, "posso ajudar?").await.unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.conversations.len(), 3);
    assert_eq!(snapshot.conversations[2].message, "posso ajudar?");
    assert!(snapshot.is_typing);

    // Approval removes the pending item and refetches the open conversation
    // (the mock log has two entries, so the optimistic append is replaced).
    engine
        .review_response("p1", ReviewPayload::new(ReviewAction::Approve))
        .await
        .unwrap();
    let snapshot = engine.snapshot();
    assert!(snapshot.pending.is_empty());
    assert_eq!(snapshot.conversations.len(), 2);

    // Logout resets every cache and stops all timers.
    engine.clear_session().await.unwrap();
    let snapshot = engine.snapshot();
    assert!(snapshot.leads.is_empty());
    assert!(snapshot.pending.is_empty());
    assert!(snapshot.conversations.is_empty());
    assert_eq!(snapshot.selected_phone, None);

    engine.shutdown().await;
}

#[tokio::test]
async fn rejection_keeps_item_in_snapshot() {
    let server = MockServer::start();
    mock_backend(&server);

    let engine = SyncEngine::start(engine_config(&server), Arc::new(LogNotifier));
    engine.set_session("tok").await.unwrap();
    wait_for(&engine, "pending item", |s| {
        s.pending.iter().any(|p| p.id == "p1")
    })
    .await;

    let mut payload = ReviewPayload::new(ReviewAction::Reject);
    payload.rejection_reason = Some("tone".to_string());
    engine.review_response("p1", payload).await.unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(
        snapshot.pending[0].status,
        leadsync::PendingStatus::Rejected
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn failed_user_action_surfaces_server_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/events");
        then.status(200).body("data: {\"type\": \"connected\"}\n\n");
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/leads");
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/pending");
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/stats");
        then.status(500).json_body(json!({ "detail": "degraded" }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/messages");
        then.status(422).json_body(json!({ "detail": "lead is archived" }));
    });

    let engine = SyncEngine::start(engine_config(&server), Arc::new(LogNotifier));
    // Stats refresh fails during bootstrap; that must stay invisible.
    engine.set_session("tok").await.unwrap();

    let err = engine.send_message(PHONE, "oi").await.unwrap_err();
    assert_eq!(err.to_string(), "lead is archived");

    // The failed send left no optimistic append behind.
    let snapshot = engine.snapshot();
    assert!(snapshot.conversations.is_empty());
    assert!(!snapshot.is_typing);

    engine.shutdown().await;
}
