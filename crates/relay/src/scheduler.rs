// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background poll that keeps the cache warm while someone is watching.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::state::RelayState;
use crate::upstream::cache::RefreshOutcome;

/// One scheduler step. Returns `None` when no viewer is focused and polling
/// was skipped.
pub async fn tick(state: &RelayState) -> Option<RefreshOutcome> {
    if !state.subscribers.any_focused().await {
        tracing::trace!("no focused viewers, skipping poll");
        return None;
    }
    Some(state.cache.ensure_fresh(state.config.refresh_tolerance_ms).await)
}

/// Spawn the periodic poller. Runs until the state's shutdown token fires.
pub fn spawn_scheduler(state: Arc<RelayState>) -> JoinHandle<()> {
    let period = state.config.update_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            tick(&state).await;
        }
    })
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
