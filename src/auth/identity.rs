// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity service client: guest connect over the OAuth token endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::error::AuthError;
use super::session::{AuthSession, SessionKind};

const GUEST_GRANT_TYPE: &str = "credentialless";

/// External auth service contract.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn guest_connect(&self) -> Result<AuthSession, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct IdentityClient {
    base_url: String,
    client_id: String,
    http: Client,
}

impl IdentityClient {
    /// Client for the identity service at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            http,
        })
    }
}

#[async_trait]
impl AuthService for IdentityClient {
    async fn guest_connect(&self) -> Result<AuthSession, AuthError> {
        let form = [
            ("grant_type", GUEST_GRANT_TYPE),
            ("client_id", self.client_id.as_str()),
        ];

        let response = self
            .http
            .post(format!(
                "{}/connect/token",
                self.base_url.trim_end_matches('/')
            ))
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Request(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Request(format!(
                "token request returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("invalid token response: {e}")))?;

        if token.access_token.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "token response did not include access_token".to_string(),
            ));
        }

        debug!(expires_in = token.expires_in, "Guest token issued");
        Ok(AuthSession {
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
            kind: SessionKind::Guest,
        })
    }
}
