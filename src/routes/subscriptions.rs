use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::domain::{FieldError, Registration};
use crate::registry::RegistryError;
use crate::routes::{
    DeviceBody, error_chain_fmt, error_response, field_error_response, success_response,
};
use crate::startup::ApplicationState;

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SubscribeBody {
    device_token: Option<String>,
    device_type: Option<String>,
    device_uuid: Option<String>,
    device_name: Option<String>,
    topic: Option<String>,
    other_data: Option<serde_json::Value>,
}

impl From<SubscribeBody> for Registration {
    fn from(body: SubscribeBody) -> Self {
        Self {
            device_token: body.device_token.unwrap_or_default(),
            device_type: body.device_type,
            device_uuid: body.device_uuid.unwrap_or_default(),
            device_name: body.device_name,
            topic: body.topic,
            other_data: body.other_data,
        }
    }
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error(transparent)]
    ValidationError(FieldError),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<RegistryError> for SubscribeError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(e) => Self::ValidationError(e),
            RegistryError::NotFound => Self::UnexpectedError(anyhow::anyhow!(e)),
            RegistryError::UnexpectedError(e) => Self::UnexpectedError(e),
        }
    }
}

impl IntoResponse for SubscribeError {
    fn into_response(self) -> Response {
        match self {
            SubscribeError::ValidationError(ref e) => field_error_response(e),
            SubscribeError::UnexpectedError(_) => {
                tracing::error!("{:?}", self);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "db_error",
                    "Failed to store the subscription.",
                )
            }
        }
    }
}

#[tracing::instrument(
    name = "Adding a device subscription",
    skip(state, body),
    fields(device_uuid = ?body.device_uuid, device_type = ?body.device_type)
)]
pub async fn subscribe(
    State(state): State<Arc<ApplicationState>>,
    DeviceBody(body): DeviceBody<SubscribeBody>,
) -> Result<Response, SubscribeError> {
    state.registry.register(body.into()).await?;

    Ok(success_response())
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct UnsubscribeBody {
    device_uuid: Option<String>,
}

#[derive(thiserror::Error)]
pub enum UnsubscribeError {
    #[error(transparent)]
    ValidationError(FieldError),
    #[error("Device not found.")]
    NotFound,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for UnsubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<RegistryError> for UnsubscribeError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(e) => Self::ValidationError(e),
            RegistryError::NotFound => Self::NotFound,
            RegistryError::UnexpectedError(e) => Self::UnexpectedError(e),
        }
    }
}

impl IntoResponse for UnsubscribeError {
    fn into_response(self) -> Response {
        match self {
            UnsubscribeError::ValidationError(ref e) => field_error_response(e),
            UnsubscribeError::NotFound => {
                error_response(StatusCode::NOT_FOUND, "not_found", "Device not found.")
            }
            UnsubscribeError::UnexpectedError(_) => {
                tracing::error!("{:?}", self);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "db_error",
                    "Failed to update the subscription.",
                )
            }
        }
    }
}

#[tracing::instrument(name = "Removing a device subscription", skip(state))]
pub async fn unsubscribe(
    State(state): State<Arc<ApplicationState>>,
    DeviceBody(body): DeviceBody<UnsubscribeBody>,
) -> Result<Response, UnsubscribeError> {
    state
        .registry
        .unregister(body.device_uuid.unwrap_or_default())
        .await?;

    Ok(success_response())
}
