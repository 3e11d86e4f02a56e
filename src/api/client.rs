use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TokenStore;
use crate::types::{ConversationMessage, Lead, PendingResponse, ReviewPayload, Stats};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{message}")]
    Api { status: u16, message: String },
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: TokenStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    pub async fn list_leads(&self) -> Result<Vec<Lead>, ApiError> {
        self.get_json("/api/leads?limit=200").await
    }

    pub async fn get_lead(&self, phone: &str) -> Result<Lead, ApiError> {
        self.get_json(&format!("/api/leads/{}", urlencoding::encode(phone)))
            .await
    }

    pub async fn delete_lead(&self, phone: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/leads/{}", urlencoding::encode(phone)));
        let response = self.send(self.http.delete(&url)).await?;
        Self::ensure_success(response).await.map(|_| ())
    }

    pub async fn conversations(&self, phone: &str) -> Result<Vec<ConversationMessage>, ApiError> {
        self.get_json(&format!(
            "/api/leads/{}/conversations",
            urlencoding::encode(phone)
        ))
        .await
    }

    /// List pending responses, optionally scoped to one lead and/or a status.
    pub async fn pending(
        &self,
        lead_phone: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<PendingResponse>, ApiError> {
        let mut query: Vec<String> = Vec::new();
        if let Some(phone) = lead_phone {
            query.push(format!("lead_phone={}", urlencoding::encode(phone)));
        }
        if let Some(status) = status {
            query.push(format!("status={status}"));
        }
        let path = if query.is_empty() {
            "/api/pending".to_string()
        } else {
            format!("/api/pending?{}", query.join("&"))
        };
        self.get_json(&path).await
    }

    pub async fn review_pending(&self, id: &str, payload: &ReviewPayload) -> Result<(), ApiError> {
        self.post_json(&format!("/api/pending/{id}/review"), payload)
            .await
    }

    pub async fn send_message(&self, phone: &str, message: &str) -> Result<(), ApiError> {
        self.post_json(
            "/api/messages",
            &serde_json::json!({ "phone": phone, "message": message }),
        )
        .await
    }

    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.get_json("/api/stats").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.http.get(self.url(path))).await?;
        let text = Self::ensure_success(response).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let response = self.send(self.http.post(self.url(path)).json(body)).await?;
        Self::ensure_success(response).await.map(|_| ())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = match self.tokens.get() {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        };
        request
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))
    }

    async fn ensure_success(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(&text, status.as_u16()),
            });
        }
        Ok(text)
    }
}

/// Pull `detail` or `message` out of an error body, mirroring what the
/// backend actually returns for validation and business errors.
fn error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    format!("request failed with status {status}")
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{DELETE, GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;
    use crate::types::{ReviewAction, ReviewPayload};

    fn client_for(server: &MockServer) -> ApiClient {
        let tokens = TokenStore::default();
        tokens.set("test-token");
        ApiClient::new(server.base_url(), tokens)
    }

    #[tokio::test]
    async fn list_leads_sends_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/leads")
                .query_param("limit", "200")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!([]));
        });

        let leads = client_for(&server).list_leads().await.unwrap();
        mock.assert();
        assert!(leads.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_dedicated_variant() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/stats");
            then.status(401).json_body(json!({ "detail": "expired" }));
        });

        let err = client_for(&server).stats().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn error_body_detail_is_surfaced() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/messages");
            then.status(422)
                .json_body(json!({ "detail": "phone is required" }));
        });

        let err = client_for(&server)
            .send_message("", "hello")
            .await
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "phone is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn review_posts_payload_to_pending_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/pending/p1/review")
                .body_contains("\"action\":\"reject\"")
                .body_contains("\"rejection_reason\":\"off brand\"");
            then.status(200).json_body(json!({ "ok": true }));
        });

        let mut payload = ReviewPayload::new(ReviewAction::Reject);
        payload.rejection_reason = Some("off brand".to_string());
        client_for(&server)
            .review_pending("p1", &payload)
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn delete_lead_encodes_phone() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path_contains("5511999999999");
            then.status(204);
        });

        client_for(&server)
            .delete_lead("+5511999999999")
            .await
            .unwrap();
        mock.assert();
    }
}
