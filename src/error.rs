// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Error Pipeline
//!
//! Every stage of the chain signals failure by returning an [`ApiError`].
//! Rendering an `ApiError` is the single place where failures become HTTP
//! responses: the error is logged (kind, message and internal detail) and a
//! uniform JSON envelope is produced.
//!
//! ## Envelope
//!
//! ```json
//! {
//!   "statusCode": 401,
//!   "success": false,
//!   "message": "Unauthorized access!",
//!   "errorMessages": [{ "path": "", "message": "Unauthorized access!" }]
//! }
//! ```
//!
//! `TooManyRequests` is the one exception and renders the fixed rate-limit
//! body (`statusCode`, `error`, `message`).

use std::any::Any;

use axum::{
    extract::rejection::JsonRejection,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::Level;

/// Public message for rate-limit denials.
pub const RATE_LIMIT_MESSAGE: &str =
    "You have exceeded the allowed number of requests. Please try again later.";

/// Abstract failure categories raised by the admission layer and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input body
    Validation,
    /// Missing or invalid credential
    Unauthenticated,
    /// Valid credential, insufficient role
    Forbidden,
    /// Admission threshold exceeded
    TooManyRequests,
    /// No matching route
    NotFound,
    /// Unexpected failure in any stage
    Internal,
}

impl ErrorKind {
    /// HTTP status for this kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `{path, message}` entry of the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub path: String,
    pub message: String,
}

impl ErrorMessage {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Typed failure handed from any stage to the Error Pipeline.
///
/// `internal` is logged but never serialized into the response body.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Vec<ErrorMessage>,
    pub internal: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            internal: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Rate-limit denial. The configured limit travels in the internal detail.
    pub fn too_many_requests(limit: u32) -> Self {
        Self::new(ErrorKind::TooManyRequests, RATE_LIMIT_MESSAGE)
            .with_internal(format!("too many requests ({limit})"))
    }

    /// Attach a field-level detail.
    pub fn with_detail(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.details.push(ErrorMessage::new(path, message));
        self
    }

    /// Attach diagnostic context that is logged but not returned.
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal = Some(internal.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// Build the serialized envelope.
    pub fn envelope(&self) -> ErrorEnvelope {
        let error_messages = if self.details.is_empty() {
            vec![ErrorMessage::new("", self.message.clone())]
        } else {
            self.details.clone()
        };

        ErrorEnvelope {
            status_code: self.status_code().as_u16(),
            success: false,
            message: self.message.clone(),
            error_messages,
        }
    }

    /// Level the rendering log entry is emitted at.
    ///
    /// Rate-limit denials are already reported by the limiter with the client
    /// key, so the pipeline only records them at `debug`.
    pub fn log_level(&self) -> Level {
        if self.status_code().is_server_error() {
            Level::ERROR
        } else if self.kind == ErrorKind::TooManyRequests {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }

    fn log(&self) {
        let status = self.status_code().as_u16();
        match self.log_level() {
            Level::ERROR => tracing::error!(
                kind = %self.kind,
                status,
                message = %self.message,
                internal = ?self.internal,
                "Request failed"
            ),
            Level::DEBUG => tracing::debug!(
                kind = %self.kind,
                status,
                internal = ?self.internal,
                "Request rejected"
            ),
            _ => tracing::warn!(
                kind = %self.kind,
                status,
                message = %self.message,
                internal = ?self.internal,
                "Request rejected"
            ),
        }
    }
}

/// Uniform error envelope. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub error_messages: Vec<ErrorMessage>,
}

/// Fixed body of a rate-limit denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitBody {
    pub status_code: u16,
    pub error: &'static str,
    pub message: &'static str,
}

impl Default for RateLimitBody {
    fn default() -> Self {
        Self {
            status_code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            error: "Too Many Requests",
            message: RATE_LIMIT_MESSAGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        if self.kind == ErrorKind::TooManyRequests {
            return (status, Json(RateLimitBody::default())).into_response();
        }

        (status, Json(self.envelope())).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("Validation Error")
            .with_detail("body", rejection.body_text())
            .with_internal(rejection.to_string())
    }
}

/// Router fallback: no route matched.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found("API Not Found").with_detail(uri.path(), "API Not Found")
}

/// Response for a panic caught inside the chain.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::internal("Something went wrong!")
        .with_internal(format!("handler panicked: {detail}"))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(ErrorKind::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::TooManyRequests.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn envelope_without_details_repeats_message() {
        let response = ApiError::unauthenticated("Unauthorized access!").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["statusCode"], 401);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Unauthorized access!");
        assert_eq!(body["errorMessages"][0]["path"], "");
        assert_eq!(body["errorMessages"][0]["message"], "Unauthorized access!");
    }

    #[tokio::test]
    async fn internal_detail_is_not_serialized() {
        let response = ApiError::internal("Something went wrong!")
            .with_internal("database password is hunter2")
            .into_response();

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test]
    async fn rate_limit_uses_fixed_body() {
        let response = ApiError::too_many_requests(100).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({
                "statusCode": 429,
                "error": "Too Many Requests",
                "message": RATE_LIMIT_MESSAGE,
            })
        );
    }

    #[test]
    fn rate_limit_error_carries_limit_internally() {
        let err = ApiError::too_many_requests(42);
        assert_eq!(err.internal.as_deref(), Some("too many requests (42)"));
    }

    #[test]
    fn rate_limit_denials_log_below_warn() {
        assert_eq!(ApiError::too_many_requests(100).log_level(), Level::DEBUG);
        assert_eq!(ApiError::forbidden("Forbidden!").log_level(), Level::WARN);
        assert_eq!(ApiError::internal("boom").log_level(), Level::ERROR);
    }

    #[tokio::test]
    async fn fallback_reports_path() {
        let err = not_found("/does-not-exist".parse().unwrap()).await;
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["errorMessages"][0]["path"], "/does-not-exist");
    }

    #[tokio::test]
    async fn panic_payload_becomes_internal_error() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Something went wrong!");
    }
}
