// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed token verification.
//!
//! The guard depends only on [`TokenVerifier`]. The shipped implementation is
//! [`HmacTokenVerifier`] (HS256 JWTs), which can also mint tokens for the
//! refresh route.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::{
    error::AuthError,
    principal::{Principal, TokenClaims},
    roles::Role,
};

/// Turns a credential string into a [`Principal`].
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// A signed token and the instant it stops verifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 JWT signer and verifier sharing one secret.
///
/// Expiry is checked with zero leeway, so a token is rejected as soon as
/// `now > exp`.
#[derive(Clone)]
pub struct HmacTokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl HmacTokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign a token for `subject` valid for `ttl` from now.
    pub fn issue(&self, subject: &str, role: Role, ttl: Duration) -> Result<String, AuthError> {
        self.issue_at(subject, role, Utc::now(), ttl)
    }

    /// Sign a token with an explicit issue time.
    pub fn issue_at(
        &self,
        subject: &str,
        role: Role,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        self.sign(subject, role, issued_at, ttl).map(|issued| issued.token)
    }

    /// Sign a token and report its expiry.
    ///
    /// A `ttl` beyond the representable range is a signing error.
    pub fn sign(
        &self,
        subject: &str,
        role: Role,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = TimeDelta::from_std(ttl).map_err(|e| AuthError::Signing(e.to_string()))?;
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Signing("expiry out of range".to_string()))?;

        let claims = TokenClaims {
            sub: subject.to_string(),
            role: role.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }
}

impl TokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        use jsonwebtoken::errors::ErrorKind;

        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            }
        })?;

        Principal::try_from(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "access-secret-access-secret-access-secret";

    #[test]
    fn issued_token_verifies() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let token = verifier
            .issue("user-1", Role::Admin, Duration::from_secs(3600))
            .unwrap();

        let principal = verifier.verify(&token).unwrap();
        assert_eq!(principal.subject_id, "user-1");
        assert_eq!(principal.role, Role::Admin);
        assert_eq!(
            (principal.expires_at - principal.issued_at).num_seconds(),
            3600
        );
    }

    #[test]
    fn sign_reports_expiry() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let issued_at = Utc::now();
        let issued = verifier
            .sign("user-1", Role::User, issued_at, Duration::from_secs(90))
            .unwrap();

        assert_eq!(issued.expires_at, issued_at + TimeDelta::seconds(90));
        let principal = verifier.verify(&issued.token).unwrap();
        assert_eq!(principal.expires_at.timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn oversized_ttl_is_a_signing_error() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let result = verifier.sign("user-1", Role::User, Utc::now(), Duration::from_secs(u64::MAX));
        assert!(matches!(result, Err(AuthError::Signing(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let issued_at = Utc::now() - TimeDelta::hours(2);
        let token = verifier
            .issue_at("user-1", Role::User, issued_at, Duration::from_secs(3600))
            .unwrap();

        assert_eq!(verifier.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = HmacTokenVerifier::new("another-secret-another-secret-another")
            .issue("user-1", Role::User, Duration::from_secs(60))
            .unwrap();

        assert_eq!(
            HmacTokenVerifier::new(SECRET).verify(&token),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let verifier = HmacTokenVerifier::new(SECRET);
        let token = verifier
            .issue("user-1", Role::User, Duration::from_secs(60))
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut claims: TokenClaims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        claims.role = "super_admin".to_string();
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(verifier.verify(&forged), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let verifier = HmacTokenVerifier::new(SECRET);
        assert_eq!(verifier.verify("not-a-jwt"), Err(AuthError::MalformedToken));
        assert_eq!(verifier.verify(""), Err(AuthError::MalformedToken));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "user-1".to_string(),
            role: "root".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &verifier.encoding).unwrap();

        assert_eq!(
            verifier.verify(&token),
            Err(AuthError::UnknownRole("root".to_string()))
        );
    }
}
