// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cross-origin policy.
//!
//! Two pieces work together:
//!
//! - [`enforce_cors`] runs first and rejects requests whose `Origin` is not
//!   allowed for the path, and preflights asking for a method or header the
//!   path does not permit. The rejection is a 403 without any
//!   `Access-Control-Allow-*` headers, so the handler never runs and the
//!   browser blocks the response.
//! - [`CorsPolicy::layer`] answers admitted preflights and decorates admitted
//!   responses.
//!
//! Requests without an `Origin` header (non-browser clients) are always
//! allowed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION,
            CONTENT_TYPE, ORIGIN,
        },
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, Method,
    },
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, MaxAge};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::pipeline::Outcome;

pub const ADMIN_PATH_PREFIX: &str = "/api/v1/admin";
pub const AUTH_PATH_PREFIX: &str = "/api/v1/auth";

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const AUTH_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Message of the 403 returned for rejected cross-origin requests.
pub const CORS_DENIED_MESSAGE: &str = "Not allowed by CORS";

static GENERAL_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];
static AUTH_METHODS: [Method; 2] = [Method::POST, Method::GET];

static GENERAL_HEADERS: [HeaderName; 3] = [
    CONTENT_TYPE,
    AUTHORIZATION,
    HeaderName::from_static("x-requested-with"),
];
static AUTH_HEADERS: [HeaderName; 2] = [CONTENT_TYPE, AUTHORIZATION];

/// Origin allow-lists and preflight cache lifetimes.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_all: bool,
    allowed: HashSet<String>,
    admin: HashSet<String>,
}

impl CorsPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            allow_all: config.is_development(),
            allowed: config.cors.allowed_origins.iter().cloned().collect(),
            admin: config.cors.admin_origins.iter().cloned().collect(),
        }
    }

    pub fn allows_all(&self) -> bool {
        self.allow_all
    }

    /// Whether `origin` may read responses from `path`.
    pub fn allows(&self, origin: Option<&str>, path: &str) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        if self.allow_all {
            return true;
        }

        let list = if under(path, ADMIN_PATH_PREFIX) {
            &self.admin
        } else {
            &self.allowed
        };
        list.contains(origin.trim_end_matches('/'))
    }

    pub fn max_age_for(&self, path: &str) -> Duration {
        if under(path, AUTH_PATH_PREFIX) {
            AUTH_MAX_AGE
        } else {
            DEFAULT_MAX_AGE
        }
    }

    /// Methods a cross-origin caller may use on `path`.
    pub fn methods_for(&self, path: &str) -> &'static [Method] {
        if under(path, AUTH_PATH_PREFIX) {
            &AUTH_METHODS
        } else {
            &GENERAL_METHODS
        }
    }

    /// Request headers a cross-origin caller may send to `path`.
    pub fn headers_for(&self, path: &str) -> &'static [HeaderName] {
        if under(path, AUTH_PATH_PREFIX) {
            &AUTH_HEADERS
        } else {
            &GENERAL_HEADERS
        }
    }

    /// Whether a preflight asking for `method` and the comma-separated
    /// `headers` may proceed on `path`.
    pub fn admits_preflight(&self, method: &str, headers: Option<&str>, path: &str) -> bool {
        let method_ok = Method::from_bytes(method.trim().as_bytes())
            .is_ok_and(|m| self.methods_for(path).contains(&m));

        let allowed = self.headers_for(path);
        let headers_ok = headers
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .all(|h| HeaderName::from_bytes(h.as_bytes()).is_ok_and(|name| allowed.contains(&name)));

        method_ok && headers_ok
    }

    /// Admission decision for a request, before any CORS headers are added.
    pub fn decide(&self, method: &Method, headers: &HeaderMap, path: &str) -> Outcome {
        let Some(origin) = headers.get(ORIGIN) else {
            return Outcome::Proceed;
        };

        let origin_ok = origin.to_str().is_ok_and(|o| self.allows(Some(o), path));
        if !origin_ok {
            debug!(origin = ?origin, path, "CORS origin rejected");
            return Outcome::Fail(
                ApiError::forbidden(CORS_DENIED_MESSAGE)
                    .with_internal(format!("origin {origin:?} not allowed for {path}")),
            );
        }

        if *method == Method::OPTIONS {
            if let Some(requested) = headers.get(ACCESS_CONTROL_REQUEST_METHOD) {
                let requested_headers = headers
                    .get(ACCESS_CONTROL_REQUEST_HEADERS)
                    .and_then(|v| v.to_str().ok());
                let admitted = requested
                    .to_str()
                    .is_ok_and(|m| self.admits_preflight(m, requested_headers, path));
                if !admitted {
                    debug!(?requested, ?requested_headers, path, "CORS preflight rejected");
                    return Outcome::Fail(
                        ApiError::forbidden(CORS_DENIED_MESSAGE)
                            .with_internal(format!("preflight {requested:?} not allowed for {path}")),
                    );
                }
            }
        }

        Outcome::Proceed
    }

    /// Response-side layer. Preflights reaching it were admitted by
    /// [`enforce_cors`], so it echoes the requested method and headers.
    pub fn layer(self: Arc<Self>) -> CorsLayer {
        let origins = self.clone();

        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, parts: &Parts| {
                    origin
                        .to_str()
                        .is_ok_and(|o| origins.allows(Some(o), parts.uri.path()))
                },
            ))
            .allow_credentials(true)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .max_age(MaxAge::dynamic(move |_origin: &HeaderValue, parts: &Parts| {
                self.max_age_for(parts.uri.path())
            }))
    }
}

/// Axum middleware running [`CorsPolicy::decide`].
pub async fn enforce_cors(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let outcome = policy.decide(request.method(), request.headers(), request.uri().path());
    outcome.run(request, next).await
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
