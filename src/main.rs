// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process::ExitCode;

use service_gate::{
    admission::AdmissionSweeper,
    api::router,
    config::AppConfig,
    lifecycle::Lifecycle,
    logging::{self, LogFormat},
    state::AppState,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    logging::init(LogFormat::from_env());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(field = e.field(), error = %e, "Config validation error");
            return ExitCode::FAILURE;
        }
    };

    if config.is_development() {
        info!("CORS: development mode, all origins allowed");
    } else {
        info!(
            mode = %config.mode,
            allowed = ?config.cors.allowed_origins,
            admin = ?config.cors.admin_origins,
            "CORS: restricted to configured origins"
        );
    }

    let state = AppState::new(config);
    let lifecycle = Lifecycle::new();

    let sweeper = AdmissionSweeper::new(
        state.limiter.tracker().clone(),
        state.clock.clone(),
        state.config.rate_limit.window,
    );
    lifecycle.spawn_supervised("admission-sweeper", sweeper.run(lifecycle.token()));

    let addr = state.config.bind_address();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %addr, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    info!(
        address = %addr,
        name = %state.config.server_name,
        mode = %state.config.mode,
        limit = state.config.rate_limit.limit,
        window_secs = state.config.rate_limit.window.as_secs(),
        "HTTP server starting"
    );

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(lifecycle.clone().shutdown_signal())
        .await;

    if let Err(e) = served {
        error!(error = %e, "HTTP server failed");
        lifecycle.fail();
    }

    // Stop background tasks if the server exited on its own.
    lifecycle.token().cancel();

    if lifecycle.has_failed() {
        error!("Shut down after a fatal error");
        return ExitCode::FAILURE;
    }

    info!("HTTP server stopped");
    ExitCode::SUCCESS
}
