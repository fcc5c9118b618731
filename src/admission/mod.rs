// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Admission Module
//!
//! Per-client request counting and rate limiting.
//!
//! ## Flow
//!
//! 1. The client address (the socket peer, or the `X-Forwarded-For` entry
//!    the configured number of proxy hops back) is normalized into a
//!    [`ClientKey`] (`::ffff:203.0.113.5` and `203.0.113.5` are the same client)
//! 2. Trusted identities (loopback by default) bypass counting entirely
//! 3. [`AdmissionTracker::record_hit`] bumps the lifetime record and the
//!    sliding window counter in one step
//! 4. The window count is compared against the configured limit
//!
//! ## State
//!
//! The tracker map is the only mutable state shared across requests. It is
//! sharded by key, so concurrent hits from the same client never lose an
//! update. [`AdmissionSweeper`] evicts clients that have been idle for several
//! windows.

pub mod clock;
pub mod key;
pub mod limiter;
pub mod sweeper;
pub mod tracker;

pub use clock::{Clock, MockClock, SystemClock};
pub use key::{forwarded_client, ClientKey};
pub use limiter::{rate_limit, AdmissionDecision, Quota, RateLimiter};
pub use sweeper::AdmissionSweeper;
pub use tracker::{
    AdmissionRecord, AdmissionTracker, WindowCounter, MAX_ROUTES_PER_CLIENT, OTHER_ROUTES,
    UNMATCHED_ROUTE,
};
