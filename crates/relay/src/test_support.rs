// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process fake Spotify, config and state
//! builders, and assertion helpers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::state::RelayState;

pub const NOW_PLAYING_PATH: &str = "/v1/me/player/currently-playing";
pub const TOKEN_PATH: &str = "/api/token";

/// Canned response: status code plus JSON body (`None` for an empty body).
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl CannedResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body: Some(body) }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: None }
    }
}

struct FakeState {
    now_playing: RwLock<CannedResponse>,
    token: RwLock<CannedResponse>,
    now_playing_hits: AtomicU32,
    token_hits: AtomicU32,
    last_bearer: RwLock<Option<String>>,
    last_token_auth: RwLock<Option<String>>,
    last_token_form: RwLock<Option<String>>,
    hold: watch::Sender<bool>,
}

/// In-process stand-in for the Spotify API and accounts service.
///
/// Counts requests, records auth headers, and can hold now-playing responses
/// open until released.
pub struct FakeSpotify {
    pub addr: SocketAddr,
    state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeSpotify {
    pub async fn start() -> anyhow::Result<Self> {
        let (hold, _) = watch::channel(false);
        let state = Arc::new(FakeState {
            now_playing: RwLock::new(CannedResponse::ok(serde_json::json!({
                "is_playing": true,
                "progress_ms": 1000,
                "item": { "name": "Test Track" },
                "context": { "type": "playlist", "uri": "spotify:playlist:abc" },
            }))),
            token: RwLock::new(CannedResponse::ok(serde_json::json!({
                "access_token": "access-1",
                "token_type": "Bearer",
                "expires_in": 3600,
            }))),
            now_playing_hits: AtomicU32::new(0),
            token_hits: AtomicU32::new(0),
            last_bearer: RwLock::new(None),
            last_token_auth: RwLock::new(None),
            last_token_form: RwLock::new(None),
            hold,
        });

        let router = Router::new()
            .route(NOW_PLAYING_PATH, get(fake_now_playing))
            .route(TOKEN_PATH, post(fake_token))
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state, handle })
    }

    pub fn api_url(&self) -> String {
        format!("http://{}{NOW_PLAYING_PATH}", self.addr)
    }

    pub fn token_url(&self) -> String {
        format!("http://{}{TOKEN_PATH}", self.addr)
    }

    pub fn now_playing_hits(&self) -> u32 {
        self.state.now_playing_hits.load(Ordering::SeqCst)
    }

    pub fn token_hits(&self) -> u32 {
        self.state.token_hits.load(Ordering::SeqCst)
    }

    pub async fn set_now_playing(&self, response: CannedResponse) {
        *self.state.now_playing.write().await = response;
    }

    pub async fn set_token(&self, response: CannedResponse) {
        *self.state.token.write().await = response;
    }

    /// Bearer token sent with the most recent now-playing request.
    pub async fn last_bearer(&self) -> Option<String> {
        self.state.last_bearer.read().await.clone()
    }

    /// `Authorization` header sent with the most recent token request.
    pub async fn last_token_auth(&self) -> Option<String> {
        self.state.last_token_auth.read().await.clone()
    }

    /// Raw form body of the most recent token request.
    pub async fn last_token_form(&self) -> Option<String> {
        self.state.last_token_form.read().await.clone()
    }

    /// Stall now-playing responses until [`Self::release`].
    pub fn hold(&self) {
        self.state.hold.send_replace(true);
    }

    pub fn release(&self) {
        self.state.hold.send_replace(false);
    }
}

impl Drop for FakeSpotify {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn canned(response: CannedResponse) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match response.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    }
}

async fn fake_now_playing(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    state.now_playing_hits.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned);
    *state.last_bearer.write().await = bearer;

    let mut hold = state.hold.subscribe();
    let _ = hold.wait_for(|held| !*held).await;

    canned(state.now_playing.read().await.clone())
}

async fn fake_token(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    state.token_hits.fetch_add(1, Ordering::SeqCst);
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned);
    *state.last_token_auth.write().await = auth;
    *state.last_token_form.write().await = Some(body);

    canned(state.token.read().await.clone())
}

/// Relay config pointed at `fake`, with CORS open and slow polling.
pub fn test_config(fake: &FakeSpotify) -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        refresh_token: Some("refresh-1".into()),
        oauth_auth: Some("Y2xpZW50OnNlY3JldA==".into()),
        client_id: None,
        client_secret: None,
        update_interval_ms: 5000,
        refresh_tolerance_ms: 500,
        fetch_timeout_ms: 5000,
        cors_allowed_hosts: r#""any""#.into(),
        strip_context: false,
        api_url: fake.api_url(),
        token_url: fake.token_url(),
        log_format: "text".into(),
        log_level: "info".into(),
    }
}

pub fn test_state(config: RelayConfig) -> anyhow::Result<Arc<RelayState>> {
    Ok(Arc::new(RelayState::new(config, CancellationToken::new())?))
}

/// Serve the relay router on a random local port.
pub async fn spawn_http_server(
    state: Arc<RelayState>,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let router = crate::transport::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: std::time::Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    check().await
}

/// Assert that an expression returns `Err` whose message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
