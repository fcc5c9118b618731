// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    /// Overall health status.
    pub status: &'static str,
    pub uptime_seconds: i64,
    /// Clients currently held by the admission tracker.
    pub tracked_clients: usize,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub service: &'static str,
    pub admission: &'static str,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<ReadyResponse> {
    let uptime = state.clock.now().signed_duration_since(state.started_at);

    Json(ReadyResponse {
        status: "ok",
        uptime_seconds: uptime.num_seconds().max(0),
        tracked_clients: state.limiter.tracker().len(),
        checks: HealthChecks {
            service: "ok",
            admission: "ok",
        },
    })
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Readiness probe handler.
pub async fn readiness(state: State<AppState>) -> Json<ReadyResponse> {
    health(state).await
}
