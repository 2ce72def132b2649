// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of connected viewers and their focus flags.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Per-connection outbound queue depth. A viewer further behind than this
/// loses frames rather than stalling the broadcast.
pub const OUTBOUND_CAPACITY: usize = 16;

pub type SubscriberId = Uuid;

/// Serialized frames queued for one viewer.
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Create the outbound queue for a new connection.
pub fn outbound_channel() -> (Outbound, mpsc::Receiver<Arc<str>>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// One live viewer connection.
pub struct Subscriber {
    pub id: SubscriberId,
    pub focused: bool,
    tx: Outbound,
}

/// Connected viewers in connection order.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<IndexMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. New viewers start focused.
    pub async fn add(&self, tx: Outbound) -> SubscriberId {
        let id = Uuid::new_v4();
        self.subscribers.write().await.insert(id, Subscriber { id, focused: true, tx });
        id
    }

    /// Returns false if `id` was not registered.
    pub async fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers.write().await.shift_remove(&id).is_some()
    }

    /// Returns false if `id` was not registered.
    pub async fn set_focused(&self, id: SubscriberId, focused: bool) -> bool {
        match self.subscribers.write().await.get_mut(&id) {
            Some(sub) => {
                sub.focused = focused;
                true
            }
            None => false,
        }
    }

    pub async fn any_focused(&self) -> bool {
        self.subscribers.read().await.values().any(|s| s.focused)
    }

    pub async fn focused_count(&self) -> usize {
        self.subscribers.read().await.values().filter(|s| s.focused).count()
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Point-in-time copy of every connection's outbound queue, for iteration
    /// without holding the registry lock.
    pub async fn snapshot(&self) -> Vec<(SubscriberId, Outbound)> {
        self.subscribers.read().await.values().map(|s| (s.id, s.tx.clone())).collect()
    }
}

#[cfg(test)]
#[path = "subscriber_tests.rs"]
mod tests;
