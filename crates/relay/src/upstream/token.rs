// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access-token supplier: keeps a bearer credential valid in the background.
//!
//! Each successful refresh schedules the next one shortly before expiry so
//! there is no gap; a failed refresh keeps whatever credential was current and
//! retries after a short fixed delay.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::epoch_ms;
use crate::upstream::client::SpotifyClient;

/// How long before expiry the next refresh fires.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(15);

/// Delay before retrying a failed refresh.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Floor for the success delay, for tokens that expire within the margin.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Authentication lifecycle of the supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// A bearer credential and its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Epoch millis.
    pub expires_at: u64,
}

struct TokenInner {
    state: AuthState,
    credential: Option<Credential>,
    refresh_token: String,
    next_refresh_at: Option<u64>,
}

/// Owns the current credential and the refresh grant used to renew it.
pub struct TokenSupplier {
    inner: RwLock<TokenInner>,
    basic_credential: String,
    client: Arc<SpotifyClient>,
}

/// Delay until the next refresh after a token valid for `expires_in_secs`.
pub fn refresh_delay(expires_in_secs: u64) -> Duration {
    Duration::from_secs(expires_in_secs).saturating_sub(EXPIRY_MARGIN).max(MIN_REFRESH_DELAY)
}

impl TokenSupplier {
    pub fn new(
        client: Arc<SpotifyClient>,
        basic_credential: String,
        refresh_token: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(TokenInner {
                state: AuthState::Unauthenticated,
                credential: None,
                refresh_token,
                next_refresh_at: None,
            }),
            basic_credential,
            client,
        })
    }

    /// The bearer token to attach to upstream requests, if one was ever minted.
    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.credential.as_ref().map(|c| c.access_token.clone())
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.inner.read().await.credential.clone()
    }

    pub async fn state(&self) -> AuthState {
        self.inner.read().await.state
    }

    /// Epoch millis of the next scheduled refresh attempt.
    pub async fn next_refresh_at(&self) -> Option<u64> {
        self.inner.read().await.next_refresh_at
    }

    /// Run one refresh attempt and return the delay until the next one.
    pub async fn refresh_once(&self) -> Duration {
        let refresh_token = {
            let mut inner = self.inner.write().await;
            inner.state = AuthState::Authenticating;
            inner.refresh_token.clone()
        };

        let result = self.client.refresh_token(&self.basic_credential, &refresh_token).await;

        let mut inner = self.inner.write().await;
        let now = epoch_ms();
        let delay = match result {
            Ok(token) => {
                let delay = refresh_delay(token.expires_in);
                inner.credential = Some(Credential {
                    access_token: token.access_token,
                    expires_at: now.saturating_add(token.expires_in.saturating_mul(1000)),
                });
                if let Some(rotated) = token.refresh_token {
                    tracing::debug!("refresh token rotated by provider");
                    inner.refresh_token = rotated;
                }
                inner.state = AuthState::Authenticated;
                tracing::info!(
                    expires_in = token.expires_in,
                    next_in_ms = duration_ms(delay),
                    "access token refreshed"
                );
                delay
            }
            Err(e) => {
                inner.state = if inner.credential.is_some() {
                    AuthState::Authenticated
                } else {
                    AuthState::Unauthenticated
                };
                tracing::warn!(
                    err = %e,
                    retry_in_ms = duration_ms(RETRY_DELAY),
                    "access token refresh failed"
                );
                RETRY_DELAY
            }
        };
        inner.next_refresh_at = Some(now.saturating_add(duration_ms(delay)));
        delay
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Spawn the refresh loop. Runs until `shutdown` is cancelled.
pub fn spawn_token_refresher(
    supplier: Arc<TokenSupplier>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = supplier.refresh_once().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    })
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
