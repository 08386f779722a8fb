use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::domain::FieldError;
use crate::fcm::Notification;
use crate::publish::PostSave;
use crate::registry::RegistryError;
use crate::routes::{
    JsonBody, error_chain_fmt, error_response, field_error_response, success_response,
};
use crate::startup::ApplicationState;

#[derive(thiserror::Error)]
pub enum AdminError {
    #[error("Missing or invalid admin token.")]
    AuthError,
    #[error(transparent)]
    ValidationError(FieldError),
    #[error("Subscriber not found.")]
    NotFound,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<RegistryError> for AdminError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(e) => Self::ValidationError(e),
            RegistryError::NotFound => Self::NotFound,
            RegistryError::UnexpectedError(e) => Self::UnexpectedError(e),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match self {
            AdminError::AuthError => {
                let mut response =
                    error_response(StatusCode::UNAUTHORIZED, "unauthorized", &self);
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            AdminError::ValidationError(ref e) => field_error_response(e),
            AdminError::NotFound => error_response(StatusCode::NOT_FOUND, "not_found", &self),
            AdminError::UnexpectedError(_) => {
                tracing::error!("{:?}", self);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Something went wrong.",
                )
            }
        }
    }
}

/// Proof that the request carried the configured admin bearer token.
pub struct AdminAuth;

impl FromRequestParts<Arc<ApplicationState>> for AdminAuth {
    type Rejection = AdminError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApplicationState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AdminError::AuthError)?;
        let expected = state.admin_token.expose_secret();

        if expected.is_empty()
            || !constant_time_eq::constant_time_eq(presented.as_bytes(), expected.as_bytes())
        {
            tracing::warn!("Rejected admin request with a bad token");
            return Err(AdminError::AuthError);
        }

        Ok(AdminAuth)
    }
}

#[derive(Deserialize, Debug)]
pub struct SearchParams {
    search: Option<String>,
}

#[tracing::instrument(name = "Admin list subscribers", skip(state, _auth))]
pub async fn list_subscribers(
    _auth: AdminAuth,
    State(state): State<Arc<ApplicationState>>,
    Query(params): Query<SearchParams>,
) -> Result<Response, AdminError> {
    let subscribers = state.registry.list(params.search.as_deref()).await?;

    Ok(Json(subscribers).into_response())
}

#[tracing::instrument(name = "Admin delete subscriber", skip(state, _auth))]
pub async fn delete_subscriber(
    _auth: AdminAuth,
    State(state): State<Arc<ApplicationState>>,
    Path(id): Path<i32>,
) -> Result<Response, AdminError> {
    state.registry.delete(id).await?;

    Ok(success_response())
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct TestNotificationBody {
    title: Option<String>,
    body: Option<String>,
}

#[tracing::instrument(name = "Admin test notification", skip(state, _auth))]
pub async fn send_test_notification(
    _auth: AdminAuth,
    State(state): State<Arc<ApplicationState>>,
    JsonBody(body): JsonBody<TestNotificationBody>,
) -> Result<Response, AdminError> {
    let title = body.title.unwrap_or_default();
    if title.trim().is_empty() {
        return Err(AdminError::ValidationError(FieldError::Missing("title")));
    }

    state
        .dispatcher
        .send(&Notification::new(title, body.body.unwrap_or_default()))
        .await;

    Ok(success_response())
}

#[derive(Deserialize, Debug)]
pub struct SavePostBody {
    post_type: String,
    status: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    send_notification: Option<bool>,
    #[serde(default)]
    schedule: Option<String>,
}

#[tracing::instrument(name = "Admin save post", skip(state, _auth, body))]
pub async fn save_post(
    _auth: AdminAuth,
    State(state): State<Arc<ApplicationState>>,
    Path(post_id): Path<i64>,
    JsonBody(body): JsonBody<SavePostBody>,
) -> Result<Response, AdminError> {
    let tracked = state
        .publisher
        .save_post(PostSave {
            post_id,
            post_type: body.post_type,
            status: body.status,
            title: body.title,
            content: body.content,
            send_notification: body.send_notification,
            schedule: body.schedule,
        })
        .await?;

    Ok(Json(serde_json::json!({ "success": true, "tracked": tracked })).into_response())
}

#[tracing::instrument(name = "Admin publish post", skip(state, _auth))]
pub async fn publish_post(
    _auth: AdminAuth,
    State(state): State<Arc<ApplicationState>>,
    Path(post_id): Path<i64>,
) -> Result<Response, AdminError> {
    let outcome = state.publisher.on_publish(post_id).await?;

    Ok(Json(outcome).into_response())
}
