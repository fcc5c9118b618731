// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service Gate - HTTP Service Skeleton
//!
//! This crate provides the request admission and identity layer that every
//! inbound request passes through before reaching business logic.
//!
//! ## Modules
//!
//! - `admission` - Per-client hit tracking and rate limiting
//! - `api` - HTTP routes and router assembly (Axum)
//! - `auth` - Signed-token verification and role guards
//! - `security` - Security headers and CORS policy
//! - `error` - Error taxonomy and the uniform error envelope
//! - `pipeline` - Stage outcomes for the middleware chain
//! - `config` - Environment configuration, validated at startup
//! - `logging` - Tracing subscriber setup
//! - `lifecycle` - Background task supervision and graceful shutdown
//! - `state` - Shared application state

pub mod admission;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod pipeline;
pub mod security;
pub mod state;
