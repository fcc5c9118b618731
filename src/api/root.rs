// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use super::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBanner {
    pub name: String,
    pub mode: String,
    pub version: &'static str,
    pub uptime_seconds: i64,
}

/// `GET /`
pub async fn banner(State(state): State<AppState>) -> ApiResponse<ServiceBanner> {
    let uptime = state.clock.now().signed_duration_since(state.started_at);

    ApiResponse::ok(
        format!("{} is running", state.config.server_name),
        ServiceBanner {
            name: state.config.server_name.clone(),
            mode: state.config.mode.to_string(),
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: uptime.num_seconds().max(0),
        },
    )
}

/// `GET /favicon.ico`
pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}
