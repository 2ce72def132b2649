// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/realtime` WebSocket: pushes payloads to viewers and tracks their focus.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use crate::state::RelayState;
use crate::subscriber::{outbound_channel, SubscriberId};

/// Focus signal sent by a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerSignal {
    Focused,
    Unfocused,
}

impl ViewerSignal {
    /// Exact-match parse; anything else is not a signal.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "focused" => Some(Self::Focused),
            "unfocused" => Some(Self::Unfocused),
            _ => None,
        }
    }
}

/// `GET /realtime` — WebSocket upgrade for a viewer.
pub async fn realtime_handler(
    State(state): State<Arc<RelayState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(state, socket))
}

/// Per-connection event loop.
async fn handle_viewer(state: Arc<RelayState>, socket: WebSocket) {
    let (tx, mut outbound) = outbound_channel();
    let id = state.subscribers.add(tx).await;
    tracing::debug!(subscriber = %id, "viewer connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    state.cache.ensure_fresh(0).await;

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::Text(frame.as_ref().into())).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_viewer_message(&state, id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.subscribers.remove(id).await;
    tracing::debug!(subscriber = %id, "viewer disconnected");
}

/// Apply one inbound text frame from a viewer.
async fn handle_viewer_message(state: &RelayState, id: SubscriberId, text: &str) {
    match ViewerSignal::parse(text) {
        Some(ViewerSignal::Focused) => {
            state.subscribers.set_focused(id, true).await;
            state.cache.ensure_fresh(0).await;
        }
        Some(ViewerSignal::Unfocused) => {
            state.subscribers.set_focused(id, false).await;
        }
        None => {
            tracing::trace!(subscriber = %id, "ignoring unknown viewer message");
        }
    }
}
