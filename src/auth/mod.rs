// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Signed-token authentication and role-based route guards.
//!
//! ## Auth Flow
//!
//! 1. Client presents an access token in the `accessToken` cookie or as
//!    `Authorization: <scheme> <token>`
//! 2. [`AuthGuard`] picks the cookie first; a bad cookie is rejected outright
//! 3. [`TokenVerifier`] checks signature and expiry and produces a
//!    [`Principal`]
//! 4. The guard checks the principal's role against its required set and
//!    stores the principal in the request extensions
//! 5. Handlers read it back with the [`Auth`] extractor
//!
//! ## Failures
//!
//! - Missing or invalid credential: 401
//! - Valid credential, role outside the required set: 403

pub mod error;
pub mod guard;
pub mod principal;
pub mod roles;
pub mod verifier;

pub use error::AuthError;
pub use guard::{
    cookie_value, extract_credential, require_auth, Auth, AuthGuard, ACCESS_TOKEN_COOKIE,
};
pub use principal::{Principal, TokenClaims};
pub use roles::Role;
pub use verifier::{HmacTokenVerifier, IssuedToken, TokenVerifier};
