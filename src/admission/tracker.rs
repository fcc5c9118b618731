// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-client hit tracking.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;

use super::key::ClientKey;

/// Distinct route labels kept per client before folding into [`OTHER_ROUTES`].
pub const MAX_ROUTES_PER_CLIENT: usize = 64;

/// Bucket for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Bucket for routes beyond [`MAX_ROUTES_PER_CLIENT`].
pub const OTHER_ROUTES: &str = "<other>";

/// Lifetime hit statistics for one client.
///
/// `total_hits` always equals the sum of `per_route_hits`, which holds at
/// most `MAX_ROUTES_PER_CLIENT + 1` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRecord {
    pub total_hits: u64,
    pub first_hit_at: DateTime<Utc>,
    pub last_hit_at: DateTime<Utc>,
    pub per_route_hits: BTreeMap<String, u64>,
}

impl AdmissionRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_hits: 0,
            first_hit_at: now,
            last_hit_at: now,
            per_route_hits: BTreeMap::new(),
        }
    }

    fn hit(&mut self, route: &str, now: DateTime<Utc>) {
        self.total_hits += 1;
        self.last_hit_at = now;

        if let Some(hits) = self.per_route_hits.get_mut(route) {
            *hits += 1;
            return;
        }
        let label = if self.per_route_hits.len() < MAX_ROUTES_PER_CLIENT {
            route
        } else {
            OTHER_ROUTES
        };
        *self.per_route_hits.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn route_hits(&self, route: &str) -> u64 {
        self.per_route_hits.get(route).copied().unwrap_or(0)
    }
}

/// Hits within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    pub hits: u32,
    pub started_at: DateTime<Utc>,
}

impl WindowCounter {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            hits: 0,
            started_at: now,
        }
    }

    fn hit(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        if now.signed_duration_since(self.started_at) >= window {
            self.hits = 1;
            self.started_at = now;
        } else {
            self.hits = self.hits.saturating_add(1);
        }
    }

    /// When the current window elapses.
    pub fn resets_at(&self, window: TimeDelta) -> DateTime<Utc> {
        self.started_at
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

struct Entry {
    record: AdmissionRecord,
    window: WindowCounter,
}

/// In-memory admission state keyed by [`ClientKey`].
///
/// All mutation goes through [`record_hit`](Self::record_hit), which updates
/// the record and the window under a single shard lock.
pub struct AdmissionTracker {
    entries: DashMap<ClientKey, Entry>,
    window: TimeDelta,
}

impl AdmissionTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// Count one request and return the updated window.
    pub fn record_hit(&self, key: &ClientKey, route: &str, now: DateTime<Utc>) -> WindowCounter {
        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            record: AdmissionRecord::new(now),
            window: WindowCounter::new(now),
        });

        entry.record.hit(route, now);
        entry.window.hit(now, self.window);
        entry.window
    }

    /// Copy of the lifetime record for `key`.
    pub fn record(&self, key: &ClientKey) -> Option<AdmissionRecord> {
        self.entries.get(key).map(|e| e.record.clone())
    }

    /// Hits counted in the window active at `now` (zero once it elapsed).
    pub fn window_hits(&self, key: &ClientKey, now: DateTime<Utc>) -> u32 {
        self.entries
            .get(key)
            .filter(|e| now.signed_duration_since(e.window.started_at) < self.window)
            .map(|e| e.window.hits)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All records, ordered by key.
    pub fn snapshot(&self) -> Vec<(ClientKey, AdmissionRecord)> {
        let mut records: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().record.clone()))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }

    /// Drop clients whose last hit is older than `idle_for`. Returns the
    /// number of evicted records.
    pub fn sweep(&self, now: DateTime<Utc>, idle_for: Duration) -> usize {
        let idle_for = TimeDelta::from_std(idle_for).unwrap_or(TimeDelta::MAX);
        let mut evicted = 0;

        self.entries.retain(|_, entry| {
            let keep = now.signed_duration_since(entry.record.last_hit_at) < idle_for;
            if !keep {
                evicted += 1;
            }
            keep
        });

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(300);

    fn key(s: &str) -> ClientKey {
        ClientKey::from_raw(s)
    }

    #[test]
    fn counts_within_window() {
        let tracker = AdmissionTracker::new(WINDOW);
        let now = Utc::now();
        let client = key("198.51.100.7");

        for expected in 1..=5 {
            let window = tracker.record_hit(&client, "/api/v1/me", now);
            assert_eq!(window.hits, expected);
        }
        assert_eq!(tracker.window_hits(&client, now), 5);
    }

    #[test]
    fn window_resets_after_duration() {
        let tracker = AdmissionTracker::new(WINDOW);
        let start = Utc::now();
        let client = key("198.51.100.7");

        tracker.record_hit(&client, "/", start);
        tracker.record_hit(&client, "/", start + TimeDelta::seconds(299));

        let later = start + TimeDelta::seconds(300);
        let window = tracker.record_hit(&client, "/", later);
        assert_eq!(window.hits, 1);
        assert_eq!(window.started_at, later);

        // Lifetime totals never reset.
        assert_eq!(tracker.record(&client).unwrap().total_hits, 3);
    }

    #[test]
    fn window_hits_expire_without_new_requests() {
        let tracker = AdmissionTracker::new(WINDOW);
        let start = Utc::now();
        let client = key("198.51.100.7");
        tracker.record_hit(&client, "/", start);

        assert_eq!(tracker.window_hits(&client, start + TimeDelta::seconds(301)), 0);
        assert_eq!(tracker.window_hits(&key("203.0.113.9"), start), 0);
    }

    #[test]
    fn total_equals_sum_of_routes() {
        let tracker = AdmissionTracker::new(WINDOW);
        let start = Utc::now();
        let client = key("203.0.113.5");
        let routes = ["/", "/health", "/api/v1/me", "/", "/api/v1/me", "/"];

        for (i, route) in routes.iter().enumerate() {
            tracker.record_hit(&client, route, start + TimeDelta::seconds(i as i64 * 100));
            let record = tracker.record(&client).unwrap();
            assert_eq!(record.total_hits, record.per_route_hits.values().sum::<u64>());
        }

        let record = tracker.record(&client).unwrap();
        assert_eq!(record.route_hits("/"), 3);
        assert_eq!(record.route_hits("/api/v1/me"), 2);
        assert_eq!(record.first_hit_at, start);
        assert_eq!(record.last_hit_at, start + TimeDelta::seconds(500));
    }

    #[test]
    fn distinct_routes_are_capped() {
        let tracker = AdmissionTracker::new(WINDOW);
        let now = Utc::now();
        let client = key("198.51.100.7");

        for i in 0..5000 {
            tracker.record_hit(&client, &format!("/x/{i}"), now);
        }

        let record = tracker.record(&client).unwrap();
        assert_eq!(record.per_route_hits.len(), MAX_ROUTES_PER_CLIENT + 1);
        assert_eq!(record.route_hits("/x/0"), 1);
        assert_eq!(record.route_hits(OTHER_ROUTES), 5000 - MAX_ROUTES_PER_CLIENT as u64);
        assert_eq!(record.total_hits, record.per_route_hits.values().sum::<u64>());
    }

    #[test]
    fn known_routes_keep_counting_past_the_cap() {
        let tracker = AdmissionTracker::new(WINDOW);
        let now = Utc::now();
        let client = key("198.51.100.7");

        tracker.record_hit(&client, "/health", now);
        for i in 0..MAX_ROUTES_PER_CLIENT {
            tracker.record_hit(&client, &format!("/x/{i}"), now);
        }
        tracker.record_hit(&client, "/health", now);

        let record = tracker.record(&client).unwrap();
        assert_eq!(record.route_hits("/health"), 2);
        assert_eq!(record.route_hits(OTHER_ROUTES), 1);
    }

    #[test]
    fn sweep_evicts_idle_clients() {
        let tracker = AdmissionTracker::new(WINDOW);
        let start = Utc::now();
        tracker.record_hit(&key("198.51.100.1"), "/", start);
        tracker.record_hit(&key("198.51.100.2"), "/", start + TimeDelta::seconds(800));

        let evicted = tracker.sweep(start + TimeDelta::seconds(900), WINDOW * 3);
        assert_eq!(evicted, 1);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.record(&key("198.51.100.1")).is_none());
        assert!(tracker.record(&key("198.51.100.2")).is_some());
    }

    #[test]
    fn snapshot_is_sorted() {
        let tracker = AdmissionTracker::new(WINDOW);
        let now = Utc::now();
        tracker.record_hit(&key("203.0.113.9"), "/", now);
        tracker.record_hit(&key("198.51.100.1"), "/", now);

        let keys: Vec<_> = tracker.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![key("198.51.100.1"), key("203.0.113.9")]);
    }

    #[test]
    fn concurrent_hits_are_not_lost() {
        let tracker = Arc::new(AdmissionTracker::new(WINDOW));
        let now = Utc::now();
        let client = key("198.51.100.7");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                let client = client.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        tracker.record_hit(&client, "/", now);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.record(&client).unwrap().total_hits, 2000);
        assert_eq!(tracker.window_hits(&client, now), 2000);
    }
}
