//! HTTP mapping of [`ServiceError`].
//!
//! Every error body has the shape
//! `{"error": {"message": ..., "type": ..., "expected"?: ..., "received"?: ...}}`.
//! Internal failures are logged in full and answered with a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parkinsight_core::ServiceError;
use serde::Serialize;

/// API error response body.
#[derive(Debug, Serialize)]
struct ApiError {
    error: ApiErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    received: Option<String>,
}

/// Build a JSON error response.
pub fn api_error(status: StatusCode, error_type: &'static str, message: &str) -> Response {
    let body = ApiError {
        error: ApiErrorDetail {
            message: message.to_string(),
            error_type,
            expected: None,
            received: None,
        },
    };
    (status, Json(body)).into_response()
}

/// A [`ServiceError`] on its way to becoming a response.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    error: ServiceError,
}

impl ApiFailure {
    /// Override the status derived from the error variant.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Status code this failure will be answered with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiFailure {
    fn from(error: ServiceError) -> Self {
        let status = match &error {
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Model(_)
            | ServiceError::Config(_)
            | ServiceError::Serialization(_)
            | ServiceError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::invalid_input(
            rejection.body_text(),
            "application/json body matching the request schema",
            format!("rejected body ({})", rejection.status()),
        )
        .into()
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let detail = match self.error {
            ServiceError::Unavailable(message) => {
                tracing::warn!(%message, "Request rejected: service unavailable");
                ApiErrorDetail {
                    message,
                    error_type: "service_unavailable",
                    expected: None,
                    received: None,
                }
            }
            ServiceError::InvalidInput {
                message,
                expected,
                received,
            } => {
                tracing::debug!(%message, %expected, %received, "Request rejected: invalid input");
                ApiErrorDetail {
                    message,
                    error_type: "invalid_input",
                    expected: Some(expected),
                    received: Some(received),
                }
            }
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiErrorDetail {
                    message: "Internal server error".to_string(),
                    error_type: "internal_error",
                    expected: None,
                    received: None,
                }
            }
        };
        (self.status, Json(ApiError { error: detail })).into_response()
    }
}
