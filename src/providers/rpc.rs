// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node connections shared by the RPC-backed providers.
//!
//! Each call builds an alloy provider against the network's primary node.
//! The node's optional `Authorization` value is sent on every request, and
//! non-standard methods go through `Provider::raw_request`.

use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::transports::http::reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use alloy::transports::http::reqwest::Client;
use alloy::transports::http::Http;
use url::Url;

use super::ProviderError;
use crate::models::{Network, RpcNode};

pub(crate) fn primary_node(network: &Network) -> Result<&RpcNode, ProviderError> {
    network
        .primary_node()
        .ok_or_else(|| ProviderError::MissingNode(network.internal_name.clone()))
}

/// Node URL, optionally with `segment` appended as one path component.
pub(crate) fn endpoint(node: &RpcNode, segment: Option<&str>) -> Result<Url, ProviderError> {
    let raw = match segment {
        Some(segment) => format!("{}/{}", node.url.trim_end_matches('/'), segment),
        None => node.url.clone(),
    };
    raw.parse()
        .map_err(|e: url::ParseError| ProviderError::InvalidRpcUrl(format!("{raw}: {e}")))
}

/// Connect to `endpoint` with the node's auth header and an optional
/// client-side timeout.
pub(crate) fn connect(
    node: &RpcNode,
    endpoint: Url,
    timeout: Option<Duration>,
) -> Result<impl Provider + Clone, ProviderError> {
    let mut headers = HeaderMap::new();
    if let Some(auth) = node.auth_header.as_deref() {
        let mut value = HeaderValue::from_str(auth)
            .map_err(|e| ProviderError::InvalidAuthHeader(e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let mut builder = Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let http = builder
        .build()
        .map_err(|e| ProviderError::Rpc(format!("failed to build HTTP client: {e}")))?;

    let client = RpcClient::new(Http::with_client(http, endpoint), false);
    Ok(ProviderBuilder::new().connect_client(client))
}
