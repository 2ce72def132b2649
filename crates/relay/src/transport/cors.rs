// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Origin policy for the pull endpoint.
//!
//! `CorsLayer` only decides which response headers to emit; browsers enforce
//! the rest. Disallowed origins are additionally refused server-side by
//! [`cors_guard`] so non-browser callers see the same policy.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::RelayError;
use crate::state::RelayState;

/// Which browser origins may call `/data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    Any,
    /// Exact `Origin` header values.
    AllowList(Vec<String>),
}

impl FromStr for CorsPolicy {
    type Err = anyhow::Error;

    /// Parses the JSON encoding: the string `"any"` or an array of origins.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || anyhow::anyhow!("invalid CORS policy {s:?}: expected \"any\" or an array of origins");
        let value: serde_json::Value = serde_json::from_str(s).map_err(|_| invalid())?;
        match value {
            serde_json::Value::String(ref v) if v == "any" => Ok(Self::Any),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(origin) => Ok(origin),
                    _ => Err(invalid()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::AllowList),
            _ => Err(invalid()),
        }
    }
}

impl CorsPolicy {
    /// Requests without an `Origin` header only pass under [`CorsPolicy::Any`].
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::AllowList(origins) => {
                origin.is_some_and(|origin| origins.iter().any(|o| o == origin))
            }
        }
    }

    /// Response-header layer matching this policy.
    pub fn layer(&self) -> CorsLayer {
        let allow_origin = match self {
            Self::Any => AllowOrigin::any(),
            Self::AllowList(origins) => AllowOrigin::list(
                origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()),
            ),
        };
        CorsLayer::new().allow_origin(allow_origin).allow_methods([Method::GET])
    }
}

/// Axum middleware that refuses requests whose origin the policy rejects.
pub async fn cors_guard(
    State(state): State<Arc<RelayState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let origin = req.headers().get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !state.cors.allows(origin) {
        tracing::debug!(origin, "request rejected by CORS policy");
        return RelayError::CorsRejected.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
#[path = "cors_tests.rs"]
mod tests;
