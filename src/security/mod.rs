// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Security Policy Layer
//!
//! Stateless per-request policy applied ahead of the rate limiter:
//!
//! - [`SecurityHeaders`]: CSP, HSTS, frame and sniffing protections, computed
//!   once at startup
//! - [`CorsPolicy`]: origin allow-lists and preflight handling, enforced by
//!   [`enforce_cors`] before any handler runs

pub mod cors;
pub mod headers;

pub use cors::{enforce_cors, CorsPolicy, CORS_DENIED_MESSAGE};
pub use headers::{security_headers, SecurityHeaders};
