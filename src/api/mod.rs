// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP routes and the middleware chain.
//!
//! Layer order, outermost first:
//!
//! 1. panic catcher (handler panics become a 500 envelope)
//! 2. request id (`x-request-id`, set and propagated)
//! 3. HTTP trace
//! 4. security headers
//! 5. CORS enforcement (disallowed origins and preflights end here with 403)
//! 6. CORS response headers and preflight answers
//! 7. rate limiter
//! 8. per-route auth guards, then handlers or the 404 fallback

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    admission::rate_limit,
    auth::{require_auth, Role},
    error::{not_found, panic_response},
    security::{enforce_cors, security_headers, CorsPolicy},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod me;
pub mod response;
pub mod root;

pub use response::ApiResponse;

pub fn router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/me", get(me::me))
        .route_layer(from_fn_with_state(state.guard(), require_auth));

    let admin_routes = Router::new()
        .route("/admission", get(admin::admission_stats))
        .route_layer(from_fn_with_state(
            state.guard().require_roles([Role::Admin, Role::SuperAdmin]),
            require_auth,
        ));

    let auth_routes = Router::new().route("/refresh", post(auth::refresh));

    let v1_routes = Router::new()
        .merge(authenticated)
        .nest("/admin", admin_routes)
        .nest("/auth", auth_routes);

    let cors = Arc::new(CorsPolicy::from_config(&state.config));

    let middleware = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(from_fn_with_state(
            state.security_headers.clone(),
            security_headers,
        ))
        .layer(from_fn_with_state(cors.clone(), enforce_cors))
        .layer(cors.layer())
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit));

    Router::new()
        .route("/", get(root::banner))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/favicon.ico", get(root::favicon))
        .nest("/api/v1", v1_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware)
}
