// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, ErrorKind};

/// Credential failure raised by the verifier or the guard.
///
/// Every variant except [`AuthError::InsufficientRole`] means the caller is
/// not authenticated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no credential in cookie or authorization header")]
    MissingCredential,
    #[error("authorization header is not `<scheme> <token>`")]
    InvalidAuthHeader,
    #[error("token is malformed")]
    MalformedToken,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    TokenExpired,
    #[error("token is not yet valid")]
    TokenNotYetValid,
    #[error("token carries unknown role \"{0}\"")]
    UnknownRole(String),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("role is not permitted for this route")]
    InsufficientRole,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::UnknownRole(_) => "unknown_role",
            AuthError::Signing(_) => "signing_failed",
            AuthError::InsufficientRole => "insufficient_role",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InsufficientRole => ErrorKind::Forbidden,
            AuthError::Signing(_) => ErrorKind::Internal,
            _ => ErrorKind::Unauthenticated,
        }
    }

    /// Public message for the error envelope.
    fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingCredential | AuthError::InvalidAuthHeader => "Unauthorized access!",
            AuthError::TokenExpired => "Token has expired",
            AuthError::InsufficientRole => "Forbidden!",
            AuthError::Signing(_) => "Something went wrong!",
            _ => "Invalid token!",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.kind(), err.public_message())
            .with_internal(format!("{}: {err}", err.error_code()))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
