// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token refresh.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::response::ApiResponse;
use crate::{
    auth::{cookie_value, AuthError, IssuedToken, TokenVerifier, ACCESS_TOKEN_COOKIE},
    error::ApiError,
    state::AppState,
};

/// Cookie holding the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /api/v1/auth/refresh`
///
/// The refresh token comes from the `refreshToken` cookie, or the JSON body
/// field of the same name when no cookie is sent.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let refresh_token = match cookie_value(&headers, REFRESH_TOKEN_COOKIE) {
        Some(token) => token,
        None => {
            let request = match body {
                Ok(Json(request)) => request,
                Err(JsonRejection::MissingJsonContentType(_)) => RefreshRequest::default(),
                Err(rejection) => return Err(rejection.into()),
            };
            request
                .refresh_token
                .filter(|t| !t.trim().is_empty())
                .ok_or(AuthError::MissingCredential)?
        }
    };

    let principal = state.refresh_tokens.verify(&refresh_token)?;

    let ttl = state.config.access_token.expires_in;
    let IssuedToken {
        token: access_token,
        expires_at,
    } = state
        .access_tokens
        .sign(&principal.subject_id, principal.role, state.clock.now(), ttl)?;

    tracing::info!(
        subject = %principal.subject_id,
        role = %principal.role,
        "Access token refreshed"
    );

    let cookie = access_cookie(&access_token, ttl.as_secs(), !state.config.is_development());
    Ok((
        [(SET_COOKIE, cookie)],
        ApiResponse::ok(
            "Access token refreshed successfully",
            RefreshResponse {
                access_token,
                expires_at,
            },
        ),
    )
        .into_response())
}

fn access_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let mut cookie =
        format!("{ACCESS_TOKEN_COOKIE}={token}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_secure_outside_development() {
        let cookie = access_cookie("abc", 60, true);
        assert_eq!(
            cookie,
            "accessToken=abc; Path=/; Max-Age=60; HttpOnly; SameSite=Strict; Secure"
        );
        assert!(!access_cookie("abc", 60, false).contains("Secure"));
    }
}
