// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::admission::{Clock, RateLimiter, SystemClock};
use crate::auth::{AuthGuard, HmacTokenVerifier};
use crate::config::AppConfig;
use crate::security::SecurityHeaders;

/// Everything handlers and middleware share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub limiter: Arc<RateLimiter>,
    pub access_tokens: Arc<HmacTokenVerifier>,
    pub refresh_tokens: Arc<HmacTokenVerifier>,
    pub security_headers: Arc<SecurityHeaders>,
    pub clock: Arc<dyn Clock>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build state around an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = RateLimiter::new(config.rate_limit.clone(), clock.clone())
            .with_hit_logging(config.is_development());

        Self {
            access_tokens: Arc::new(HmacTokenVerifier::new(&config.access_token.secret)),
            refresh_tokens: Arc::new(HmacTokenVerifier::new(&config.refresh_token.secret)),
            security_headers: Arc::new(SecurityHeaders::from_config(&config)),
            limiter: Arc::new(limiter),
            started_at: clock.now(),
            clock,
            config: Arc::new(config),
        }
    }

    /// Guard over access tokens admitting any role.
    pub fn guard(&self) -> AuthGuard {
        AuthGuard::new(self.access_tokens.clone())
    }
}
