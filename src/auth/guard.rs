// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route guard and principal extractor.
//!
//! ```rust,ignore
//! let guard = AuthGuard::new(verifier).require_roles([Role::Admin, Role::SuperAdmin]);
//!
//! Router::new()
//!     .route("/api/v1/admin/admission", get(admission_stats))
//!     .route_layer(middleware::from_fn_with_state(guard, require_auth));
//!
//! async fn admission_stats(Auth(principal): Auth) -> impl IntoResponse { /* ... */ }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
    middleware::Next,
    response::Response,
};

use super::{error::AuthError, principal::Principal, roles::Role, verifier::TokenVerifier};
use crate::pipeline::Outcome;

/// Cookie holding the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Authenticates requests and enforces an optional role set.
///
/// An empty role set admits any authenticated principal.
#[derive(Clone)]
pub struct AuthGuard {
    verifier: Arc<dyn TokenVerifier>,
    required: HashSet<Role>,
}

impl AuthGuard {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier,
            required: HashSet::new(),
        }
    }

    pub fn require_roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        self.required = roles.into_iter().collect();
        self
    }

    pub fn required_roles(&self) -> &HashSet<Role> {
        &self.required
    }

    /// Extract, verify and authorize the request credential.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = extract_credential(headers)?;
        let principal = self.verifier.verify(&token)?;
        self.authorize(&principal)?;
        Ok(principal)
    }

    pub fn authorize(&self, principal: &Principal) -> Result<(), AuthError> {
        if self.required.is_empty() || self.required.contains(&principal.role) {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole)
        }
    }
}

/// Access cookie first, then `Authorization: <scheme> <token>`.
///
/// A present cookie wins even if a header is also sent.
pub fn extract_credential(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(token) = cookie_value(headers, ACCESS_TOKEN_COOKIE) {
        return Ok(token);
    }

    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(AuthError::MissingCredential);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;

    match value.trim().split_once(' ') {
        Some((_scheme, token)) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Value of the named cookie across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.trim_matches('"').to_string())
}

/// Axum middleware running [`AuthGuard::authenticate`].
///
/// On success the [`Principal`] is inserted into the request extensions.
pub async fn require_auth(
    State(guard): State<AuthGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = match guard.authenticate(request.headers()) {
        Ok(principal) => {
            tracing::debug!(
                subject = %principal.subject_id,
                role = %principal.role,
                "Request authenticated"
            );
            request.extensions_mut().insert(principal);
            Outcome::Proceed
        }
        Err(err) => Outcome::Fail(err.into()),
    };

    outcome.run(request, next).await
}

/// Extractor for the principal attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingCredential)
    }
}
