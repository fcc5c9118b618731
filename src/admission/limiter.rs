// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request admission decisions.
//!
//! The limiter runs once per request before route dispatch. Responses for
//! counted requests carry draft-7 rate-limit headers:
//!
//! ```text
//! RateLimit-Policy: 100;w=300
//! RateLimit: limit=100, remaining=42, reset=187
//! ```
//!
//! Denials additionally carry `Retry-After`.
//!
//! Hits are attributed to the matched route template (`/api/v1/me`), or to
//! a single unmatched bucket for requests that fall through to the 404
//! fallback.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::{
    clock::Clock,
    key::{forwarded_client, ClientKey},
    tracker::{AdmissionTracker, UNMATCHED_ROUTE},
};
use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::pipeline::Outcome;

pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
pub const RATELIMIT: HeaderName = HeaderName::from_static("ratelimit");

/// Remaining allowance for a client after a counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
    pub window: Duration,
}

impl Quota {
    /// Seconds until reset, rounded up.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    pub fn apply_headers(&self, headers: &mut HeaderMap, denied: bool) {
        let policy = format!("{};w={}", self.limit, self.window.as_secs());
        let state = format!(
            "limit={}, remaining={}, reset={}",
            self.limit,
            self.remaining,
            self.reset_secs()
        );

        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(RATELIMIT_POLICY, value);
        }
        if let Ok(value) = HeaderValue::from_str(&state) {
            headers.insert(RATELIMIT, value);
        }
        if denied {
            headers.insert(RETRY_AFTER, HeaderValue::from(self.reset_secs()));
        }
    }
}

/// Result of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Trusted identity, not counted.
    Bypass,
    Allow(Quota),
    Deny(Quota),
}

impl AdmissionDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, AdmissionDecision::Deny(_))
    }

    pub fn quota(&self) -> Option<Quota> {
        match self {
            AdmissionDecision::Bypass => None,
            AdmissionDecision::Allow(q) | AdmissionDecision::Deny(q) => Some(*q),
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            AdmissionDecision::Deny(quota) => Outcome::Fail(ApiError::too_many_requests(quota.limit)),
            _ => Outcome::Proceed,
        }
    }
}

/// Gates requests against [`RateLimitConfig`].
pub struct RateLimiter {
    config: RateLimitConfig,
    tracker: Arc<AdmissionTracker>,
    clock: Arc<dyn Clock>,
    log_hits: bool,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tracker: Arc::new(AdmissionTracker::new(config.window)),
            config,
            clock,
            log_hits: false,
        }
    }

    /// Emit per-request statistics at `debug` level.
    pub fn with_hit_logging(mut self, enabled: bool) -> Self {
        self.log_hits = enabled;
        self
    }

    pub fn tracker(&self) -> &Arc<AdmissionTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Trusted when either the raw address or its normalized key is listed.
    pub fn is_trusted(&self, raw: &str, key: &ClientKey) -> bool {
        let trusted = &self.config.trusted_identities;
        trusted.contains(raw.trim()) || trusted.contains(key.as_str())
    }

    /// Count the request against `route` and decide whether it may proceed.
    pub fn check(&self, raw: &str, method: &Method, route: &str) -> AdmissionDecision {
        let key = ClientKey::from_raw(raw);
        if self.is_trusted(raw, &key) {
            return AdmissionDecision::Bypass;
        }

        let now = self.clock.now();
        let window = self.tracker.record_hit(&key, route, now);
        if self.log_hits {
            self.log_hit(&key, route);
        }

        let reset_after = window
            .resets_at(self.tracker.window())
            .signed_duration_since(now)
            .to_std()
            .unwrap_or_default();
        let quota = Quota {
            limit: self.config.limit,
            remaining: self.config.limit.saturating_sub(window.hits),
            reset_after,
            window: self.config.window,
        };

        if window.hits > self.config.limit {
            warn!(
                client = %key,
                method = %method,
                route,
                limit = self.config.limit,
                "Rate limit exceeded"
            );
            AdmissionDecision::Deny(quota)
        } else {
            AdmissionDecision::Allow(quota)
        }
    }

    fn log_hit(&self, key: &ClientKey, route: &str) {
        if let Some(record) = self.tracker.record(key) {
            debug!(
                client = %key,
                route,
                total_hits = record.total_hits,
                route_hits = record.route_hits(route),
                first_hit_at = %record.first_hit_at,
                "Admission hit"
            );
        }
    }
}

/// Client address of the request, empty when the peer is unknown.
fn client_address(request: &Request, proxy_hops: usize) -> String {
    let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() else {
        return String::new();
    };

    let forwarded: Vec<&str> = request
        .headers()
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let chain = (!forwarded.is_empty()).then(|| forwarded.join(","));

    forwarded_client(peer.ip(), chain.as_deref(), proxy_hops).to_string()
}

/// Matched route template, or the unmatched bucket.
fn route_label(request: &Request) -> &str {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or(UNMATCHED_ROUTE)
}

/// Axum middleware running [`RateLimiter::check`].
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let raw = client_address(&request, limiter.config.trust_proxy_hops);
    let decision = limiter.check(&raw, request.method(), route_label(&request));

    let mut response = decision.outcome().run(request, next).await;
    if let Some(quota) = decision.quota() {
        quota.apply_headers(response.headers_mut(), decision.is_denied());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::clock::MockClock;
    use crate::config::{DeploymentMode, RateLimitConfig};
    use chrono::Utc;

    fn limiter(mode: DeploymentMode) -> (RateLimiter, MockClock) {
        let clock = MockClock::new(Utc::now());
        let limiter = RateLimiter::new(RateLimitConfig::for_mode(mode), Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn denies_after_limit_within_window() {
        let (limiter, clock) = limiter(DeploymentMode::Production);

        for i in 1..=100u32 {
            let decision = limiter.check("198.51.100.7", &Method::GET, "/api/v1/me");
            match decision {
                AdmissionDecision::Allow(quota) => assert_eq!(quota.remaining, 100 - i),
                other => panic!("request {i} unexpectedly {other:?}"),
            }
            clock.advance(Duration::from_secs(2));
        }

        let decision = limiter.check("198.51.100.7", &Method::GET, "/api/v1/me");
        assert!(decision.is_denied());
        assert_eq!(decision.quota().unwrap().remaining, 0);
    }

    #[test]
    fn allows_again_after_window() {
        let (limiter, clock) = limiter(DeploymentMode::Production);
        for _ in 0..101 {
            limiter.check("198.51.100.7", &Method::GET, "/");
        }
        assert!(limiter.check("198.51.100.7", &Method::GET, "/").is_denied());

        clock.advance(Duration::from_secs(300));
        let decision = limiter.check("198.51.100.7", &Method::GET, "/");
        assert!(matches!(decision, AdmissionDecision::Allow(q) if q.remaining == 99));
    }

    #[test]
    fn trusted_identities_bypass() {
        let (limiter, _) = limiter(DeploymentMode::Production);
        for raw in ["127.0.0.1", "::ffff:127.0.0.1", "::1"] {
            for _ in 0..250 {
                assert_eq!(
                    limiter.check(raw, &Method::GET, "/"),
                    AdmissionDecision::Bypass
                );
            }
        }
        assert!(limiter.tracker().is_empty());
    }

    #[test]
    fn mapped_ipv6_shares_counter() {
        let (limiter, _) = limiter(DeploymentMode::Production);
        for _ in 0..50 {
            limiter.check("203.0.113.5", &Method::GET, "/");
            limiter.check("::ffff:203.0.113.5", &Method::GET, "/");
        }

        assert_eq!(limiter.tracker().len(), 1);
        assert!(limiter.check("::ffff:203.0.113.5", &Method::GET, "/").is_denied());
    }

    #[test]
    fn non_production_limit_is_permissive() {
        let (limiter, _) = limiter(DeploymentMode::Development);
        for _ in 0..500 {
            assert!(!limiter.check("198.51.100.7", &Method::GET, "/").is_denied());
        }
        assert!(limiter.check("198.51.100.7", &Method::GET, "/").is_denied());
    }

    #[test]
    fn headers_follow_draft_seven() {
        let quota = Quota {
            limit: 100,
            remaining: 42,
            reset_after: Duration::from_millis(186_200),
            window: Duration::from_secs(300),
        };

        let mut headers = HeaderMap::new();
        quota.apply_headers(&mut headers, false);
        assert_eq!(headers[RATELIMIT_POLICY], "100;w=300");
        assert_eq!(headers[RATELIMIT], "limit=100, remaining=42, reset=187");
        assert!(headers.get(RETRY_AFTER).is_none());
        assert!(headers.get("x-ratelimit-limit").is_none());

        quota.apply_headers(&mut headers, true);
        assert_eq!(headers[RETRY_AFTER], "187");
    }

    #[test]
    fn deny_outcome_carries_limit() {
        let (limiter, _) = limiter(DeploymentMode::Production);
        for _ in 0..100 {
            limiter.check("198.51.100.7", &Method::POST, "/");
        }
        match limiter.check("198.51.100.7", &Method::POST, "/").outcome() {
            Outcome::Fail(err) => {
                assert_eq!(err.internal.as_deref(), Some("too many requests (100)"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
