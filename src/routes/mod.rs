mod admin;
mod health_check;
mod subscriptions;

use std::error::Error;
use std::fmt::Formatter;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, FormRejection, JsonRejection};
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::de::DeserializeOwned;

use crate::domain::FieldError;

pub use admin::*;
pub use health_check::*;
pub use subscriptions::*;

pub fn error_chain_fmt(e: &impl Error, f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "{}", e)?;

    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        writeln!(f, "Originated from:\n\t{:?}\n", cause)?;
        current = cause.source();
    }

    Ok(())
}

/// Error payload shared by every endpoint: `{"code", "message", "data": {"status"}}`.
pub fn error_response(status: StatusCode, code: &str, message: impl ToString) -> Response {
    let body = serde_json::json!({
        "code": code,
        "message": message.to_string(),
        "data": { "status": status.as_u16() },
    });

    (status, Json(body)).into_response()
}

/// 400 response for a field the domain refused.
pub fn field_error_response(e: &FieldError) -> Response {
    let code = match e {
        FieldError::Missing(_) => "missing_data",
        FieldError::TooLong(..) => "invalid_data",
    };

    error_response(StatusCode::BAD_REQUEST, code, e)
}

pub fn success_response() -> Response {
    Json(serde_json::json!({ "success": true })).into_response()
}

#[derive(thiserror::Error)]
pub enum BodyRejection {
    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),
    #[error(transparent)]
    FormRejection(#[from] FormRejection),
    #[error(transparent)]
    BytesRejection(#[from] BytesRejection),
}

impl std::fmt::Debug for BodyRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        tracing::warn!("{:?}", self);

        match self {
            BodyRejection::JsonRejection(rejection) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
            }
            BodyRejection::FormRejection(rejection) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
            }
            BodyRejection::BytesRejection(rejection) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
            }
        }
    }
}

/// `Json` with the rejection rendered in the shared error format.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(BodyRejection))]
pub struct JsonBody<T>(pub T);

/// Device payload sent either as an urlencoded form or as JSON.
///
/// An empty body deserializes to `T::default()`, leaving field checks to the domain.
pub struct DeviceBody<T>(pub T);

impl<S, T> FromRequest<S> for DeviceBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = BodyRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state).await?;
            return Ok(Self(value));
        }

        let bytes = Bytes::from_request(req, state).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        let Json(value) = Json::<T>::from_bytes(&bytes)?;
        Ok(Self(value))
    }
}
