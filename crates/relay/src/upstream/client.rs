// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the Spotify now-playing and token endpoints.

use std::sync::Once;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// OAuth token response from the refresh grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    /// Present when the provider rotates refresh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// HTTP client wrapper for the two upstream resources.
pub struct SpotifyClient {
    api_url: String,
    token_url: String,
    client: Client,
}

impl SpotifyClient {
    pub fn new(api_url: String, token_url: String, timeout: Duration) -> anyhow::Result<Self> {
        ensure_crypto();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { api_url, token_url, client })
    }

    fn apply_auth(
        &self,
        req: reqwest::RequestBuilder,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Fetch the currently playing document.
    ///
    /// Spotify answers 204 when nothing is playing; that maps to `Null`.
    pub async fn currently_playing(
        &self,
        access_token: Option<&str>,
    ) -> anyhow::Result<serde_json::Value> {
        let req = self.client.get(&self.api_url);
        let resp = self.apply_auth(req, access_token).send().await?.error_for_status()?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(serde_json::Value::Null);
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_token(
        &self,
        basic_credential: &str,
        refresh_token: &str,
    ) -> anyhow::Result<TokenResponse> {
        let resp = self
            .client
            .post(&self.token_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {basic_credential}"))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("token refresh failed ({status}): {text}");
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }
}
