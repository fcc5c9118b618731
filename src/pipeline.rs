// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stage outcomes for the middleware chain.
//!
//! Each admission stage decides on a request and returns an [`Outcome`]
//! instead of calling the next stage itself. [`Outcome::run`] turns that
//! decision into chain behavior, so the stage logic stays testable without a
//! running server.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Decision made by a single stage.
#[derive(Debug)]
pub enum Outcome {
    /// Hand the request to the next stage.
    Proceed,
    /// Short-circuit with this response.
    Respond(Response),
    /// Forward a failure to the Error Pipeline.
    Fail(ApiError),
}

impl Outcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Outcome::Proceed)
    }

    /// Apply the decision to the chain.
    pub async fn run(self, request: Request, next: Next) -> Response {
        match self {
            Outcome::Proceed => next.run(request).await,
            Outcome::Respond(response) => response,
            Outcome::Fail(err) => err.into_response(),
        }
    }
}

impl From<ApiError> for Outcome {
    fn from(err: ApiError) -> Self {
        Outcome::Fail(err)
    }
}

impl<E> From<Result<(), E>> for Outcome
where
    E: Into<ApiError>,
{
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Outcome::Proceed,
            Err(e) => Outcome::Fail(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn stage(request: Request, next: Next) -> Response {
        let outcome = match request.headers().get("x-stage").and_then(|v| v.to_str().ok()) {
            Some("respond") => Outcome::Respond(StatusCode::ACCEPTED.into_response()),
            Some("fail") => Outcome::Fail(ApiError::forbidden("Forbidden!")),
            _ => Outcome::Proceed,
        };
        outcome.run(request, next).await
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "handler" }))
            .layer(middleware::from_fn(stage))
    }

    async fn status_for(stage_header: Option<&str>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = stage_header {
            builder = builder.header("x-stage", value);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn proceed_reaches_handler() {
        assert_eq!(status_for(None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn respond_short_circuits() {
        assert_eq!(status_for(Some("respond")).await, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn fail_renders_error_envelope() {
        assert_eq!(status_for(Some("fail")).await, StatusCode::FORBIDDEN);
    }

    #[test]
    fn result_converts_to_outcome() {
        let ok: Result<(), ApiError> = Ok(());
        assert!(Outcome::from(ok).is_proceed());

        let err: Result<(), ApiError> = Err(ApiError::not_found("gone"));
        match Outcome::from(err) {
            Outcome::Fail(e) => assert_eq!(e.kind, ErrorKind::NotFound),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
