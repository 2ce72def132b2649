// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the relay HTTP API.
//!
//! Uses `axum_test::TestServer` for the relay and an in-process fake Spotify
//! for upstream.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::ORIGIN;
use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;

use playrelay::config::RelayConfig;
use playrelay::state::RelayState;
use playrelay::subscriber::outbound_channel;
use playrelay::test_support::{
    spawn_http_server, test_config, test_state, wait_until, CannedResponse, FakeSpotify,
};
use playrelay::transport::build_router;
use playrelay::transport::http::HealthResponse;
use playrelay::upstream::token::AuthState;

fn test_server(state: Arc<RelayState>) -> anyhow::Result<TestServer> {
    TestServer::new(build_router(state))
}

fn allow_list_config(fake: &FakeSpotify) -> RelayConfig {
    let mut config = test_config(fake);
    config.cors_allowed_hosts = r#"["https://good.example"]"#.into();
    config
}

// -- Pull endpoint ------------------------------------------------------------

#[tokio::test]
async fn data_fetches_once_and_serves_cache() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let server = test_server(test_state(test_config(&fake))?)?;

    let resp = server.get("/data").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["item"]["name"], "Test Track");
    assert_eq!(body["is_playing"], true);

    let again: serde_json::Value = server.get("/data").await.json();
    assert_eq!(again, body);
    assert_eq!(fake.now_playing_hits(), 1);
    Ok(())
}

#[tokio::test]
async fn data_is_null_when_nothing_ever_fetched() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    fake.set_now_playing(CannedResponse::status(401)).await;
    let server = test_server(test_state(test_config(&fake))?)?;

    let resp = server.get("/data").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(body.is_null());
    Ok(())
}

#[tokio::test]
async fn data_serves_stale_payload_after_failure() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let mut config = test_config(&fake);
    config.update_interval_ms = 1;
    config.refresh_tolerance_ms = 0;
    let server = test_server(test_state(config)?)?;

    let first: serde_json::Value = server.get("/data").await.json();
    fake.set_now_playing(CannedResponse::status(502)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let resp = server.get("/data").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body, first);
    assert_eq!(fake.now_playing_hits(), 2);
    Ok(())
}

#[tokio::test]
async fn data_strips_context_when_enabled() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let mut config = test_config(&fake);
    config.strip_context = true;
    let server = test_server(test_state(config)?)?;

    let body: serde_json::Value = server.get("/data").await.json();
    assert!(body.get("context").is_none());
    assert_eq!(body["item"]["name"], "Test Track");
    Ok(())
}

#[tokio::test]
async fn dropped_pull_client_does_not_cancel_fetch() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;
    let (addr, _server) = spawn_http_server(Arc::clone(&state)).await?;
    let (tx, mut rx) = outbound_channel();
    state.subscribers.add(tx).await;
    fake.hold();

    let client = reqwest::Client::builder().timeout(Duration::from_millis(300)).build()?;
    let resp = client.get(format!("http://{addr}/data")).send().await;
    assert!(resp.is_err(), "held pull answered early");
    assert_eq!(fake.now_playing_hits(), 1);

    // Give the server time to drop the abandoned handler.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.cache.is_fetching());

    fake.release();
    let cache = &state.cache;
    let stored = wait_until(Duration::from_secs(5), || async move { cache.read().await.is_some() })
        .await;
    assert!(stored, "cache never filled after the pull client went away");

    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("outbound closed"))?;
    let frame: serde_json::Value = serde_json::from_str(&frame)?;
    assert_eq!(frame["item"]["name"], "Test Track");
    assert_eq!(fake.now_playing_hits(), 1);
    Ok(())
}

// -- CORS ---------------------------------------------------------------------

#[tokio::test]
async fn allow_list_rejects_unknown_origin() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let server = test_server(test_state(allow_list_config(&fake))?)?;

    let resp = server
        .get("/data")
        .add_header(ORIGIN, HeaderValue::from_static("https://evil.example"))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "CORS_REJECTED");

    // Rejected requests never reach the cache.
    assert_eq!(fake.now_playing_hits(), 0);
    Ok(())
}

#[tokio::test]
async fn allow_list_accepts_listed_origin() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let server = test_server(test_state(allow_list_config(&fake))?)?;

    let resp = server
        .get("/data")
        .add_header(ORIGIN, HeaderValue::from_static("https://good.example"))
        .await;
    resp.assert_status_ok();
    assert_eq!(
        resp.headers().get("access-control-allow-origin"),
        Some(&HeaderValue::from_static("https://good.example"))
    );
    Ok(())
}

#[tokio::test]
async fn allow_list_rejects_missing_origin() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let server = test_server(test_state(allow_list_config(&fake))?)?;

    server.get("/data").await.assert_status(StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn any_policy_accepts_every_origin() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let server = test_server(test_state(test_config(&fake))?)?;

    let resp = server
        .get("/data")
        .add_header(ORIGIN, HeaderValue::from_static("https://evil.example"))
        .await;
    resp.assert_status_ok();
    assert_eq!(
        resp.headers().get("access-control-allow-origin"),
        Some(&HeaderValue::from_static("*"))
    );
    Ok(())
}

#[tokio::test]
async fn cors_policy_does_not_apply_to_health() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let server = test_server(test_state(allow_list_config(&fake))?)?;

    let resp = server
        .get("/health")
        .add_header(ORIGIN, HeaderValue::from_static("https://evil.example"))
        .await;
    resp.assert_status_ok();
    Ok(())
}

// -- Health -------------------------------------------------------------------

#[tokio::test]
async fn health_reports_auth_and_cache_state() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;
    let server = test_server(Arc::clone(&state))?;

    let before: HealthResponse = server.get("/health").await.json();
    assert_eq!(before.status, "running");
    assert_eq!(before.auth, AuthState::Unauthenticated);
    assert_eq!(before.subscribers, 0);
    assert_eq!(before.last_fetched_at, None);
    assert!(!before.fetching);

    state.tokens.refresh_once().await;
    server.get("/data").await.assert_status_ok();

    let after: HealthResponse = server.get("/health").await.json();
    assert_eq!(after.auth, AuthState::Authenticated);
    assert_eq!(after.last_fetched_at, Some(state.cache.last_fetched_at()));
    assert_eq!(fake.last_bearer().await.as_deref(), Some("access-1"));
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_404() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let server = test_server(test_state(test_config(&fake))?)?;

    server.get("/api/v1/data").await.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}
