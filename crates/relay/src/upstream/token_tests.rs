// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde_json::json;

use super::*;
use crate::test_support::{test_config, test_state, wait_until, CannedResponse, FakeSpotify};

#[yare::parameterized(
    one_hour      = { 3600, 3_585_000 },
    one_minute    = { 60,   45_000 },
    inside_margin = { 10,   1_000 },
    zero          = { 0,    1_000 },
)]
fn refresh_delay_leaves_margin(expires_in: u64, expected_ms: u64) {
    assert_eq!(refresh_delay(expires_in), Duration::from_millis(expected_ms));
}

#[tokio::test]
async fn starts_unauthenticated() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;

    assert_eq!(state.tokens.state().await, AuthState::Unauthenticated);
    assert_eq!(state.tokens.access_token().await, None);
    assert_eq!(state.tokens.next_refresh_at().await, None);
    Ok(())
}

#[tokio::test]
async fn success_schedules_before_expiry() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;

    let before = epoch_ms();
    let delay = state.tokens.refresh_once().await;
    let after = epoch_ms();

    assert_eq!(delay, Duration::from_millis(3_600_000 - 15_000));
    assert_eq!(state.tokens.state().await, AuthState::Authenticated);
    assert_eq!(state.tokens.access_token().await.as_deref(), Some("access-1"));

    let next = state.tokens.next_refresh_at().await.ok_or_else(|| anyhow::anyhow!("unscheduled"))?;
    assert!(next >= before + 3_585_000 && next <= after + 3_585_000, "next={next}");

    let cred = state.tokens.credential().await.ok_or_else(|| anyhow::anyhow!("no credential"))?;
    assert!(cred.expires_at >= before + 3_600_000 && cred.expires_at <= after + 3_600_000);
    Ok(())
}

#[tokio::test]
async fn sends_refresh_grant_with_basic_auth() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;

    state.tokens.refresh_once().await;

    assert_eq!(fake.last_token_auth().await.as_deref(), Some("Basic Y2xpZW50OnNlY3JldA=="));
    let form = fake.last_token_form().await.unwrap_or_default();
    assert!(form.contains("grant_type=refresh_token"), "form={form}");
    assert!(form.contains("refresh_token=refresh-1"), "form={form}");
    Ok(())
}

#[tokio::test]
async fn failure_retries_quickly_and_keeps_credential() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;
    state.tokens.refresh_once().await;

    fake.set_token(CannedResponse::status(500)).await;
    let before = epoch_ms();
    let delay = state.tokens.refresh_once().await;
    let after = epoch_ms();

    assert_eq!(delay, RETRY_DELAY);
    assert_eq!(state.tokens.access_token().await.as_deref(), Some("access-1"));
    assert_eq!(state.tokens.state().await, AuthState::Authenticated);
    let next = state.tokens.next_refresh_at().await.ok_or_else(|| anyhow::anyhow!("unscheduled"))?;
    assert!(next >= before + 5000 && next <= after + 5000, "next={next}");
    Ok(())
}

#[tokio::test]
async fn failure_without_credential_stays_unauthenticated() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;
    fake.set_token(CannedResponse::status(400)).await;

    assert_eq!(state.tokens.refresh_once().await, RETRY_DELAY);
    assert_eq!(state.tokens.state().await, AuthState::Unauthenticated);
    assert_eq!(state.tokens.access_token().await, None);
    Ok(())
}

#[tokio::test]
async fn rotated_refresh_token_is_adopted() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;
    fake.set_token(CannedResponse::ok(json!({
        "access_token": "access-2",
        "expires_in": 3600,
        "refresh_token": "refresh-2",
    })))
    .await;

    state.tokens.refresh_once().await;
    state.tokens.refresh_once().await;

    let form = fake.last_token_form().await.unwrap_or_default();
    assert!(form.contains("refresh_token=refresh-2"), "form={form}");
    Ok(())
}

#[tokio::test]
async fn refresher_task_authenticates_and_stops() -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;

    let handle = spawn_token_refresher(Arc::clone(&state.tokens), state.shutdown.clone());
    let tokens = &state.tokens;
    let authed = wait_until(Duration::from_secs(5), || async move {
        tokens.state().await == AuthState::Authenticated
    })
    .await;
    assert!(authed, "refresher never authenticated");
    assert_eq!(fake.token_hits(), 1);

    state.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    Ok(())
}

#[yare::parameterized(
    one_hour         = { 3600 },
    hundredth_of_max = { u64::MAX / 100 },
    max              = { u64::MAX },
)]
#[test_macro(tokio::test)]
async fn large_expiry_saturates(expires_in: u64) -> anyhow::Result<()> {
    let fake = FakeSpotify::start().await?;
    let state = test_state(test_config(&fake))?;
    fake.set_token(CannedResponse::ok(json!({
        "access_token": "access-big",
        "expires_in": expires_in,
    })))
    .await;

    let before = epoch_ms();
    let delay = state.tokens.refresh_once().await;
    let after = epoch_ms();

    assert_eq!(delay, refresh_delay(expires_in));
    assert_eq!(state.tokens.state().await, AuthState::Authenticated);

    let cred = state.tokens.credential().await.ok_or_else(|| anyhow::anyhow!("no credential"))?;
    assert_eq!(cred.access_token, "access-big");
    let lifetime = expires_in.saturating_mul(1000);
    assert!(cred.expires_at >= before.saturating_add(lifetime));
    assert!(cred.expires_at <= after.saturating_add(lifetime));

    let next = state.tokens.next_refresh_at().await.ok_or_else(|| anyhow::anyhow!("unscheduled"))?;
    assert!(next >= before);
    Ok(())
}
