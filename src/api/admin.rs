// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only endpoints.
//!
//! Mounted behind a guard requiring `admin` or `super_admin`.

use axum::extract::State;
use serde::Serialize;

use super::response::ApiResponse;
use crate::{
    admission::{AdmissionRecord, ClientKey},
    auth::Auth,
    state::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStats {
    pub window_seconds: u64,
    pub limit: u32,
    pub tracked_clients: usize,
    pub clients: Vec<ClientStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub client: ClientKey,
    /// Hits in the currently active window.
    pub window_hits: u32,
    #[serde(flatten)]
    pub record: AdmissionRecord,
}

/// `GET /api/v1/admin/admission`
pub async fn admission_stats(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResponse<AdmissionStats> {
    let limiter = &state.limiter;
    let tracker = limiter.tracker();
    let now = limiter.clock().now();

    let clients: Vec<ClientStats> = tracker
        .snapshot()
        .into_iter()
        .map(|(client, record)| ClientStats {
            window_hits: tracker.window_hits(&client, now),
            client,
            record,
        })
        .collect();

    tracing::info!(
        subject = %principal.subject_id,
        role = %principal.role,
        clients = clients.len(),
        "Admission statistics requested"
    );

    ApiResponse::ok(
        "Admission statistics retrieved successfully",
        AdmissionStats {
            window_seconds: limiter.config().window.as_secs(),
            limit: limiter.config().limit,
            tracked_clients: clients.len(),
            clients,
        },
    )
}
