use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;

use crate::fcm::BROADCAST_TOPIC;
use crate::fcm::credentials::{CredentialError, CredentialProvider};

/// A notification for every subscribed device, optionally tied to the post
/// that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub post_id: Option<String>,
    pub post_type: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            post_id: None,
            post_type: None,
        }
    }

    pub fn with_post(mut self, post_id: impl ToString, post_type: impl Into<String>) -> Self {
        self.post_id = Some(post_id.to_string());
        self.post_type = Some(post_type.into());
        self
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    topic: &'a str,
    notification: NotificationBlock<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<BTreeMap<&'static str, &'a str>>,
}

#[derive(Serialize)]
struct NotificationBlock<'a> {
    title: &'a str,
    body: &'a str,
}

impl<'a> SendRequest<'a> {
    fn new(notification: &'a Notification) -> Self {
        let data = [
            ("post_id", notification.post_id.as_deref()),
            ("post_type", notification.post_type.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect::<BTreeMap<_, _>>();

        Self {
            message: Message {
                topic: BROADCAST_TOPIC,
                notification: NotificationBlock {
                    title: &notification.title,
                    body: &notification.body,
                },
                data: (!data.is_empty()).then_some(data),
            },
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("No access token available for sending.")]
    Credentials(#[from] CredentialError),
    #[error("FCM project id is not configured.")]
    MissingProjectId,
    #[error("Failed to reach the FCM send endpoint.")]
    Transport(#[from] reqwest::Error),
}

/// What FCM answered. Non-2xx answers are not errors: they are logged verbatim.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub status: StatusCode,
    pub body: String,
}

pub struct NotificationDispatcher {
    credentials: Arc<CredentialProvider>,
    http_client: reqwest::Client,
    base_url: String,
    project_id: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(
        credentials: Arc<CredentialProvider>,
        http_client: reqwest::Client,
        base_url: String,
        project_id: Option<String>,
    ) -> Self {
        Self {
            credentials,
            http_client,
            base_url,
            project_id,
        }
    }

    /// Sends `notification` to the broadcast topic, logging instead of failing.
    pub async fn send(&self, notification: &Notification) {
        match self.try_send(notification).await {
            Ok(outcome) => {
                tracing::info!(
                    status = %outcome.status,
                    response = %outcome.body,
                    "FCM notification sent"
                );
            }
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "FCM notification was not sent"
                );
            }
        }
    }

    #[tracing::instrument(
        name = "Send an FCM notification",
        skip(self, notification),
        fields(title = %notification.title, post_id = ?notification.post_id)
    )]
    pub async fn try_send(
        &self,
        notification: &Notification,
    ) -> Result<DispatchOutcome, DispatchError> {
        let access_token = self.credentials.access_token().await?;
        let project_id = self
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(DispatchError::MissingProjectId)?;

        let url = format!("{}/v1/projects/{}/messages:send", self.base_url, project_id);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token.as_str())
            .json(&SendRequest::new(notification))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        Ok(DispatchOutcome { status, body })
    }
}
