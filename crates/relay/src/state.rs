// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::config::RelayConfig;
use crate::subscriber::SubscriberRegistry;
use crate::transport::cors::CorsPolicy;
use crate::upstream::cache::Cache;
use crate::upstream::client::SpotifyClient;
use crate::upstream::token::TokenSupplier;

/// Shared relay state. One instance per process.
pub struct RelayState {
    pub config: RelayConfig,
    pub cors: CorsPolicy,
    pub tokens: Arc<TokenSupplier>,
    pub cache: Arc<Cache>,
    pub subscribers: Arc<SubscriberRegistry>,
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(config: RelayConfig, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let cors = config.cors_policy()?;
        let client = Arc::new(SpotifyClient::new(
            config.api_url.clone(),
            config.token_url.clone(),
            config.fetch_timeout(),
        )?);
        let tokens = TokenSupplier::new(
            Arc::clone(&client),
            config.basic_credential()?,
            config.refresh_token.clone().unwrap_or_default(),
        );
        let subscribers = Arc::new(SubscriberRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&subscribers)));
        let cache = Arc::new(Cache::new(
            client,
            Arc::clone(&tokens),
            broadcaster,
            config.update_interval_ms,
            config.strip_context,
        ));
        Ok(Self { config, cors, tokens, cache, subscribers, shutdown })
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
