// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream Spotify communication: HTTP client, token supplier, and cache.

pub mod cache;
pub mod client;
pub mod token;
