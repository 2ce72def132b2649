// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Playrelay: polls Spotify's now-playing resource once and fans the result
//! out to any number of viewers.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod subscriber;
pub mod test_support;
pub mod transport;
pub mod upstream;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::scheduler::spawn_scheduler;
use crate::state::RelayState;
use crate::transport::build_router;
use crate::upstream::token::spawn_token_refresher;

/// Run the relay until ctrl-c.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let state = Arc::new(RelayState::new(config, shutdown.clone())?);

    spawn_token_refresher(Arc::clone(&state.tokens), shutdown.clone());
    spawn_scheduler(Arc::clone(&state));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
                shutdown.cancel();
            }
        });
    }

    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("playrelay listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
