// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared now-playing cache with single-flight refresh.
//!
//! Every trigger (HTTP pull, viewer connect, focus signal, scheduler tick)
//! funnels through [`Cache::ensure_fresh`]. At most one upstream request is
//! outstanding at a time; triggers that arrive while it runs return
//! immediately and read whatever is cached.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::broadcast::Broadcaster;
use crate::state::epoch_ms;
use crate::upstream::client::SpotifyClient;
use crate::upstream::token::TokenSupplier;

/// Field removed from payloads when context stripping is enabled.
pub const CONTEXT_FIELD: &str = "context";

/// The last successfully fetched now-playing document.
#[derive(Debug, Clone, Serialize)]
pub struct CachedPayload {
    pub data: serde_json::Value,
    /// Epoch millis.
    pub fetched_at: u64,
}

/// What a call to [`Cache::ensure_fresh`] or [`Cache::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache was within the freshness window; nothing fetched.
    Fresh,
    /// Another refresh was already outstanding; nothing started.
    InFlight,
    /// Fetched and stored a new payload.
    Updated,
    /// Upstream request failed; previous payload kept.
    Failed,
}

/// Whether a payload fetched at `last_fetched_at` must be refetched at `now`.
///
/// All values are millis. A cache that never fetched (`last_fetched_at == 0`)
/// is always stale.
pub fn needs_refresh(last_fetched_at: u64, now: u64, interval_ms: u64, tolerance_ms: u64) -> bool {
    now.saturating_sub(last_fetched_at) >= interval_ms.saturating_sub(tolerance_ms)
}

/// Drop the playback context from a payload in place.
pub fn strip_context(data: &mut serde_json::Value) {
    if let Some(obj) = data.as_object_mut() {
        obj.remove(CONTEXT_FIELD);
    }
}

/// Holds the in-flight flag for the lifetime of one upstream fetch.
///
/// Owns the cache so the fetch task can outlive the trigger that started it.
struct FlightGuard(Arc<Cache>);

impl FlightGuard {
    fn acquire(cache: &Arc<Cache>) -> Option<Self> {
        cache
            .fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(cache)))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.fetching.store(false, Ordering::Release);
    }
}

pub struct Cache {
    payload: RwLock<Option<Arc<CachedPayload>>>,
    last_fetched_at: AtomicU64,
    fetching: AtomicBool,
    refresh_interval_ms: u64,
    strip_context: bool,
    client: Arc<SpotifyClient>,
    tokens: Arc<TokenSupplier>,
    broadcaster: Arc<Broadcaster>,
}

impl Cache {
    pub fn new(
        client: Arc<SpotifyClient>,
        tokens: Arc<TokenSupplier>,
        broadcaster: Arc<Broadcaster>,
        refresh_interval_ms: u64,
        strip_context: bool,
    ) -> Self {
        Self {
            payload: RwLock::new(None),
            last_fetched_at: AtomicU64::new(0),
            fetching: AtomicBool::new(false),
            refresh_interval_ms,
            strip_context,
            client,
            tokens,
            broadcaster,
        }
    }

    /// Current payload; `None` until the first successful fetch.
    pub async fn read(&self) -> Option<Arc<CachedPayload>> {
        self.payload.read().await.clone()
    }

    /// Epoch millis of the last successful fetch, or 0.
    pub fn last_fetched_at(&self) -> u64 {
        self.last_fetched_at.load(Ordering::Acquire)
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    /// Refresh unless the payload is younger than the interval minus `tolerance_ms`.
    pub async fn ensure_fresh(self: &Arc<Self>, tolerance_ms: u64) -> RefreshOutcome {
        self.ensure_fresh_at(epoch_ms(), tolerance_ms).await
    }

    /// [`Self::ensure_fresh`] with an explicit clock reading.
    pub async fn ensure_fresh_at(self: &Arc<Self>, now: u64, tolerance_ms: u64) -> RefreshOutcome {
        if !needs_refresh(self.last_fetched_at(), now, self.refresh_interval_ms, tolerance_ms) {
            return RefreshOutcome::Fresh;
        }
        self.refresh().await
    }

    /// Fetch from upstream unless a fetch is already outstanding.
    ///
    /// The fetch runs on its own task; dropping the caller detaches from it
    /// without cancelling the upstream call. On success the new payload is
    /// stored and broadcast before the flag is released, so a trigger that sees
    /// the flag clear also sees the new stamp.
    pub async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        let Some(flight) = FlightGuard::acquire(self) else {
            tracing::trace!("refresh already in flight");
            return RefreshOutcome::InFlight;
        };

        let task = tokio::spawn(async move {
            let outcome = flight.0.fetch_and_store().await;
            drop(flight);
            outcome
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(err = %e, "now playing fetch task failed");
                RefreshOutcome::Failed
            }
        }
    }

    async fn fetch_and_store(&self) -> RefreshOutcome {
        let token = self.tokens.access_token().await;
        match self.client.currently_playing(token.as_deref()).await {
            Ok(mut data) => {
                if self.strip_context {
                    strip_context(&mut data);
                }
                let fetched_at = epoch_ms();
                let payload = Arc::new(CachedPayload { data, fetched_at });
                *self.payload.write().await = Some(Arc::clone(&payload));
                self.last_fetched_at.store(fetched_at, Ordering::Release);

                let delivered = self.broadcaster.publish(&payload.data).await;
                tracing::debug!(delivered, "now playing refreshed");
                RefreshOutcome::Updated
            }
            Err(e) => {
                tracing::warn!(err = %e, "now playing fetch failed");
                RefreshOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
