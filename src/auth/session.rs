// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token and the process-wide slot holding it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Guest,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub kind: SessionKind,
}

impl AuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Shared session slot. Empty until a session is bootstrapped or signed in.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<Option<AuthSession>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored session, expired or not.
    pub async fn current(&self) -> Option<AuthSession> {
        self.inner.read().await.clone()
    }

    /// Install a session obtained from an interactive sign-in.
    pub async fn sign_in(&self, session: AuthSession) {
        *self.inner.write().await = Some(session);
    }

    pub(crate) async fn store(&self, session: AuthSession) {
        *self.inner.write().await = Some(session);
    }

    /// Forget the session at the end of the user's session.
    pub async fn end(&self) {
        self.inner.write().await.take();
    }
}
