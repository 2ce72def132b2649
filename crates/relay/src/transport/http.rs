// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers: pull endpoint and health.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::RelayState;
use crate::upstream::token::AuthState;

/// `GET /data` — refresh if stale, then return whatever is cached.
///
/// Always 200: a never-fetched or stale-after-failure cache is returned as is
/// (`null` before the first successful fetch).
pub async fn data(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    state.cache.ensure_fresh(0).await;
    let body = state.cache.read().await.map(|p| p.data.clone()).unwrap_or_default();
    Json(body)
}

/// Health response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub auth: AuthState,
    pub subscribers: usize,
    pub focused: usize,
    /// Epoch millis of the last successful fetch.
    pub last_fetched_at: Option<u64>,
    pub fetching: bool,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    let last = state.cache.last_fetched_at();
    Json(HealthResponse {
        status: "running".to_owned(),
        auth: state.tokens.state().await,
        subscribers: state.subscribers.len().await,
        focused: state.subscribers.focused_count().await,
        last_fetched_at: (last > 0).then_some(last),
        fetching: state.cache.is_fetching(),
    })
}
