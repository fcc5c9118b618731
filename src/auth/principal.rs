// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{error::AuthError, roles::Role};

/// Wire claims of an access or refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject id
    pub sub: String,
    /// Role name, see [`Role`]
    pub role: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Identity attached to a request after successful verification.
///
/// Lives in the request extensions for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub subject_id: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

impl TryFrom<TokenClaims> for Principal {
    type Error = AuthError;

    fn try_from(claims: TokenClaims) -> Result<Self, Self::Error> {
        let role = Role::parse(&claims.role).ok_or(AuthError::UnknownRole(claims.role))?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(AuthError::MalformedToken)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::MalformedToken)?;

        Ok(Self {
            subject_id: claims.sub,
            role,
            issued_at,
            expires_at,
        })
    }
}
