// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out of freshly fetched payloads to every connected viewer.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use crate::subscriber::SubscriberRegistry;

/// Pushes payloads to all registered connections, focused or not.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Queue `payload` on every connection registered right now.
    ///
    /// Best-effort: a full or closed queue skips that viewer only. Returns the
    /// number of connections the frame was queued for.
    pub async fn publish(&self, payload: &serde_json::Value) -> usize {
        let frame: Arc<str> = match serde_json::to_string(payload) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::warn!(err = %e, "failed to serialize payload for broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, tx) in self.registry.snapshot().await {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(subscriber = %id, "viewer lagging, dropping frame");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %id, "viewer disconnected mid-broadcast");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
