// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use base64::Engine;
use clap::Parser;

use crate::transport::cors::CorsPolicy;

/// Now-playing relay: polls Spotify once and fans results out to viewers.
///
/// The unprefixed env names (`PORT`, `REFRESH_TOKEN`, ...) are the ones
/// existing deployments already set.
#[derive(Debug, Clone, Parser)]
#[command(name = "playrelay", version, about)]
pub struct RelayConfig {
    /// Host address to bind to.
    #[arg(long, default_value = "0.0.0.0", env = "RELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000, env = "PORT")]
    pub port: u16,

    /// Spotify refresh token used to mint access tokens.
    #[arg(long, env = "REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Pre-encoded `base64(client_id:client_secret)` for the token endpoint.
    #[arg(long, env = "SPOTIFY_OAUTH_AUTH", hide_env_values = true)]
    pub oauth_auth: Option<String>,

    /// Client ID, used with `--client-secret` when `--oauth-auth` is unset.
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret, used with `--client-id` when `--oauth-auth` is unset.
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// How long a fetched payload stays fresh, in milliseconds. Also the
    /// scheduler tick period.
    #[arg(long, default_value_t = 5000, env = "UPDATE_INTERVAL")]
    pub update_interval_ms: u64,

    /// Slack subtracted from the interval on scheduler ticks so a fetch just
    /// triggered by a viewer is not repeated by the timer.
    #[arg(long, default_value_t = 500, env = "RELAY_REFRESH_TOLERANCE_MS")]
    pub refresh_tolerance_ms: u64,

    /// Upper bound on a single upstream request, in milliseconds.
    #[arg(long, default_value_t = 10000, env = "RELAY_FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: u64,

    /// JSON-encoded CORS policy for `/data`: `"any"` or an array of origins.
    #[arg(long, default_value = r#""any""#, env = "CORS_ALLOWED_HOSTS")]
    pub cors_allowed_hosts: String,

    /// Remove the `context` field from payloads before caching them.
    #[arg(long, env = "STRIP_CONTEXT")]
    pub strip_context: bool,

    /// Now-playing resource.
    #[arg(
        long,
        default_value = "https://api.spotify.com/v1/me/player/currently-playing",
        env = "SPOTIFY_API_URL"
    )]
    pub api_url: String,

    /// OAuth token endpoint.
    #[arg(long, default_value = "https://accounts.spotify.com/api/token", env = "SPOTIFY_TOKEN_URL")]
    pub token_url: String,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "RELAY_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "RELAY_LOG_LEVEL")]
    pub log_level: String,
}

impl RelayConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_token.as_deref().is_none_or(str::is_empty) {
            anyhow::bail!("--refresh-token (REFRESH_TOKEN) must be specified");
        }
        self.basic_credential()?;

        if self.update_interval_ms == 0 {
            anyhow::bail!("update interval must be greater than zero");
        }
        if self.refresh_tolerance_ms >= self.update_interval_ms {
            anyhow::bail!(
                "refresh tolerance ({}ms) must be smaller than the update interval ({}ms)",
                self.refresh_tolerance_ms,
                self.update_interval_ms
            );
        }
        if self.fetch_timeout_ms == 0 {
            anyhow::bail!("fetch timeout must be greater than zero");
        }
        self.cors_policy()?;

        match self.log_format.as_str() {
            "json" | "text" => Ok(()),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }

    /// The value sent as `Authorization: Basic ...` to the token endpoint.
    pub fn basic_credential(&self) -> anyhow::Result<String> {
        if let Some(ref encoded) = self.oauth_auth {
            if !encoded.is_empty() {
                return Ok(encoded.clone());
            }
        }
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok(base64::engine::general_purpose::STANDARD
                .encode(format!("{id}:{secret}"))),
            _ => anyhow::bail!(
                "either --oauth-auth (SPOTIFY_OAUTH_AUTH) or both --client-id and --client-secret must be specified"
            ),
        }
    }

    pub fn cors_policy(&self) -> anyhow::Result<CorsPolicy> {
        self.cors_allowed_hosts.parse()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
