// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guest-session bootstrap before protected actions.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::error::AuthError;
use super::identity::AuthService;
use super::session::{AuthSession, SessionKind, SessionState};

pub struct AuthSessionBootstrapper {
    service: Arc<dyn AuthService>,
    state: SessionState,
    // Serializes bootstraps so concurrent callers share one guest connect.
    connect_gate: Mutex<()>,
}

impl AuthSessionBootstrapper {
    /// Bootstrapper that connects guests through `service` and stores the
    /// result in `state`.
    pub fn new(service: Arc<dyn AuthService>, state: SessionState) -> Self {
        Self {
            service,
            state,
            connect_gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Return the live session, creating a guest one if there is none.
    pub async fn ensure_session(&self) -> Result<AuthSession, AuthError> {
        if let Some(session) = self.usable_session().await? {
            return Ok(session);
        }

        let _gate = self.connect_gate.lock().await;
        // Another caller may have finished a connect while we waited.
        if let Some(session) = self.usable_session().await? {
            return Ok(session);
        }

        let session = self.service.guest_connect().await.map_err(|e| {
            warn!(error = %e, "Guest connect failed");
            AuthError::AuthBootstrapFailed(e.to_string())
        })?;

        self.state.store(session.clone()).await;
        info!(expires_at = %session.expires_at, "Guest session created");
        Ok(session)
    }

    async fn usable_session(&self) -> Result<Option<AuthSession>, AuthError> {
        match self.state.current().await {
            Some(session) if !session.is_expired() => Ok(Some(session)),
            Some(session) if session.kind == SessionKind::Authenticated => {
                Err(AuthError::SessionExpired)
            }
            _ => Ok(None),
        }
    }
}
