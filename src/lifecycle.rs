// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Process Lifecycle
//!
//! Background tasks share one `CancellationToken` with the HTTP server. A
//! task that panics marks the process as failed and cancels the token, which
//! triggers the same graceful shutdown as Ctrl-C or SIGTERM: stop accepting,
//! drain in-flight requests, then exit.

use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
    failed: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a background task. If it panics, the process shuts down.
    pub fn spawn_supervised<F>(&self, name: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = tokio::spawn(task);
        let lifecycle = self.clone();

        tokio::spawn(async move {
            if let Err(e) = inner.await {
                if e.is_panic() {
                    error!(task = name, error = %e, "Background task panicked");
                    lifecycle.fail();
                }
            }
        })
    }

    /// Mark the process as failed and begin shutdown.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.token.cancel();
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Resolves on Ctrl-C, SIGTERM or token cancellation.
    pub async fn shutdown_signal(self) {
        shutdown_signal(self.token).await
    }
}

pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
        _ = token.cancelled() => info!("Shutdown requested"),
    }

    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn panicking_task_triggers_shutdown() {
        let lifecycle = Lifecycle::new();
        let handle = lifecycle.spawn_supervised("exploding", async {
            panic!("boom");
        });
        handle.await.unwrap();

        assert!(lifecycle.has_failed());
        assert!(lifecycle.token().is_cancelled());
    }

    #[tokio::test]
    async fn completed_task_does_not_fail() {
        let lifecycle = Lifecycle::new();
        lifecycle.spawn_supervised("quiet", async {}).await.unwrap();

        assert!(!lifecycle.has_failed());
        assert!(!lifecycle.token().is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_resolves_shutdown_signal() {
        let lifecycle = Lifecycle::new();
        let waiting = tokio::spawn(lifecycle.clone().shutdown_signal());
        lifecycle.token().cancel();

        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("shutdown signal did not resolve")
            .unwrap();
    }
}
