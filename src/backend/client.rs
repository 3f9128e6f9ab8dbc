// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the swap backend REST API.
//!
//! Every response is wrapped in `{ "data": ..., "error": { "code", "message" } }`.
//! The bearer token is read from [`SessionState`] at request time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{ApiError, BackendError, SwapBackend};
use crate::auth::SessionState;
use crate::models::{Swap, SwapIntent};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct CreatedSwap {
    swap_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SwapApiClient {
    base_url: String,
    session: SessionState,
    http: Client,
}

impl SwapApiClient {
    /// Client for the swap API at `base_url`, authorised by whatever session
    /// `session` holds at call time.
    pub fn new(
        base_url: impl Into<String>,
        session: SessionState,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            session,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.current().await {
            Some(session) => request.header("Authorization", session.bearer()),
            None => request,
        }
    }

    /// Send `request` and unwrap the envelope, keeping `data` optional.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        op: &str,
    ) -> Result<Option<T>, BackendError> {
        let response = self.authorized(request).await.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Transport(format!("{op} failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(op, status = status.as_u16(), "Swap backend responded");

        let envelope = serde_json::from_str::<Envelope<T>>(&body);
        if let Ok(Envelope {
            error: Some(error), ..
        }) = envelope
        {
            return Err(BackendError::Api(error));
        }

        if !status.is_success() {
            return Err(BackendError::Transport(format!(
                "{op} returned {status}: {body}"
            )));
        }

        match envelope {
            Ok(envelope) => Ok(envelope.data),
            Err(_) if body.trim().is_empty() => Ok(None),
            Err(e) => Err(BackendError::InvalidResponse(format!(
                "{op} invalid JSON: {e}"
            ))),
        }
    }

    async fn send_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        op: &str,
    ) -> Result<T, BackendError> {
        self.send(request, op)
            .await?
            .ok_or_else(|| BackendError::InvalidResponse(format!("{op} returned no data")))
    }
}

#[async_trait]
impl SwapBackend for SwapApiClient {
    async fn create_swap(&self, intent: &SwapIntent) -> Result<Uuid, BackendError> {
        let request = self.http.post(self.url("/api/swaps")).json(intent);
        let created: CreatedSwap = self.send_data(request, "create swap").await?;
        Ok(created.swap_id)
    }

    async fn get_swap(&self, swap_id: Uuid) -> Result<Swap, BackendError> {
        let request = self.http.get(self.url(&format!("/api/swaps/{swap_id}")));
        self.send_data(request, "get swap").await
    }

    async fn cancel_swap(&self, swap_id: Uuid) -> Result<(), BackendError> {
        let request = self.http.delete(self.url(&format!("/api/swaps/{swap_id}")));
        self.send::<Value>(request, "cancel swap").await?;
        Ok(())
    }

    async fn get_exchange_deposit_address(
        &self,
        exchange: &str,
        asset: &str,
    ) -> Result<String, BackendError> {
        let request = self.http.get(self.url(&format!(
            "/api/exchange_accounts/{exchange}/deposit_address/{asset}"
        )));
        self.send_data(request, "get deposit address").await
    }
}
