use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::fcm::credentials::{CredentialError, CredentialProvider};

/// Keeps a device token's membership of a broadcast topic in sync.
///
/// Both operations are fire-and-forget: failures are logged by the
/// implementation and never reach the caller.
#[async_trait]
pub trait TopicMembership: Send + Sync {
    async fn subscribe(&self, token: &str, topic: &str);

    async fn unsubscribe(&self, token: &str, topic: &str);
}

#[derive(thiserror::Error, Debug)]
pub enum TopicError {
    #[error("No access token available for the topic call.")]
    Credentials(#[from] CredentialError),
    #[error("Failed to reach the Instance ID API.")]
    Transport(#[from] reqwest::Error),
    #[error("Instance ID API rejected the call ({status}): {reason}")]
    Rejected { status: StatusCode, reason: String },
}

#[derive(Clone, Copy, Debug)]
enum BatchAction {
    Add,
    Remove,
}

impl BatchAction {
    fn as_str(&self) -> &'static str {
        match self {
            BatchAction::Add => "batchAdd",
            BatchAction::Remove => "batchRemove",
        }
    }
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<BatchResult>,
}

#[derive(Deserialize)]
struct BatchResult {
    error: Option<String>,
}

/// Topic membership backed by the Instance ID batch API.
pub struct TopicManager {
    credentials: Arc<CredentialProvider>,
    http_client: reqwest::Client,
    base_url: String,
}

impl TopicManager {
    pub fn new(
        credentials: Arc<CredentialProvider>,
        http_client: reqwest::Client,
        base_url: String,
    ) -> Self {
        Self {
            credentials,
            http_client,
            base_url,
        }
    }

    pub async fn try_subscribe(&self, token: &str, topic: &str) -> Result<(), TopicError> {
        self.batch(BatchAction::Add, token, topic).await
    }

    pub async fn try_unsubscribe(&self, token: &str, topic: &str) -> Result<(), TopicError> {
        self.batch(BatchAction::Remove, token, topic).await
    }

    #[tracing::instrument(name = "Update FCM topic membership", skip(self, token))]
    async fn batch(&self, action: BatchAction, token: &str, topic: &str) -> Result<(), TopicError> {
        let access_token = self.credentials.access_token().await?;

        let url = format!("{}/iid/v1:{}", self.base_url, action.as_str());
        let body = serde_json::json!({
            "to": format!("/topics/{}", topic),
            "registration_tokens": [token],
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token.as_str())
            .header("access_token_auth", "true")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TopicError::Rejected {
                status,
                reason: text,
            });
        }

        // A 200 may still carry a per-token error, e.g. `NOT_FOUND` for a stale token
        let per_token_error = serde_json::from_str::<BatchResponse>(&text)
            .ok()
            .and_then(|parsed| parsed.results.into_iter().find_map(|result| result.error));
        if let Some(reason) = per_token_error {
            return Err(TopicError::Rejected { status, reason });
        }

        Ok(())
    }
}

#[async_trait]
impl TopicMembership for TopicManager {
    async fn subscribe(&self, token: &str, topic: &str) {
        if let Err(e) = self.try_subscribe(token, topic).await {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                topic,
                "FCM topic subscription failed"
            );
        }
    }

    async fn unsubscribe(&self, token: &str, topic: &str) {
        if let Err(e) = self.try_unsubscribe(token, topic).await {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                topic,
                "FCM topic unsubscription failed"
            );
        }
    }
}
