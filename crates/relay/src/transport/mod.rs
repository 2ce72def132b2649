// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the relay.

pub mod cors;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    // Origin policy applies to the pull endpoint only.
    let data = Router::new()
        .route("/data", get(http::data))
        .route_layer(middleware::from_fn_with_state(state.clone(), cors::cors_guard))
        .layer(state.cors.layer());

    Router::new()
        .merge(data)
        .route("/realtime", get(ws::realtime_handler))
        .route("/health", get(http::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
