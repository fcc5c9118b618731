// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Admission Sweeper
//!
//! Background task that evicts admission records of clients that have gone
//! quiet. Without it the tracker keeps one entry per address ever seen.
//!
//! Every window duration the sweeper drops records whose last hit is older
//! than [`IDLE_WINDOWS`] windows. It stops when the shared
//! `CancellationToken` is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{clock::Clock, tracker::AdmissionTracker};

/// Records idle for this many windows are evicted.
pub const IDLE_WINDOWS: u32 = 3;

pub struct AdmissionSweeper {
    tracker: Arc<AdmissionTracker>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    idle_for: Duration,
}

impl AdmissionSweeper {
    /// Sweep every `window`, evicting clients idle for [`IDLE_WINDOWS`] windows.
    pub fn new(tracker: Arc<AdmissionTracker>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            tracker,
            clock,
            interval: window,
            idle_for: window.saturating_mul(IDLE_WINDOWS),
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.idle_for
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            idle_secs = self.idle_for.as_secs(),
            "Admission sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Admission sweeper shutting down");
                    return;
                }
            }

            self.sweep_once();
        }
    }

    /// Execute one eviction pass and return the number of evicted clients.
    pub fn sweep_once(&self) -> usize {
        let evicted = self.tracker.sweep(self.clock.now(), self.idle_for);
        if evicted > 0 {
            info!(
                evicted,
                remaining = self.tracker.len(),
                "Admission sweeper: evicted idle clients"
            );
        } else {
            debug!(tracked = self.tracker.len(), "Admission sweeper: nothing to evict");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{clock::MockClock, key::ClientKey};
    use chrono::Utc;

    const WINDOW: Duration = Duration::from_secs(300);

    #[test]
    fn evicts_after_three_idle_windows() {
        let clock = MockClock::new(Utc::now());
        let tracker = Arc::new(AdmissionTracker::new(WINDOW));
        let sweeper = AdmissionSweeper::new(tracker.clone(), Arc::new(clock.clone()), WINDOW);
        assert_eq!(sweeper.idle_for(), Duration::from_secs(900));

        tracker.record_hit(&ClientKey::from_raw("198.51.100.7"), "/", clock.now());

        clock.advance(Duration::from_secs(899));
        assert_eq!(sweeper.sweep_once(), 0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(sweeper.sweep_once(), 1);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn stops_on_cancellation() {
        let tracker = Arc::new(AdmissionTracker::new(WINDOW));
        let sweeper = AdmissionSweeper::new(tracker, Arc::new(MockClock::default()), WINDOW);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
