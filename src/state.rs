// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthSessionBootstrapper, IdentityClient, SessionState};
use crate::backend::{SwapApiClient, SwapBackend};
use crate::config::{AppConfig, Settings};
use crate::error::Error;
use crate::providers::BalanceProviderRegistry;
use crate::storage::RedirectRecoveryStore;

/// Process-wide singletons, injected into controllers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub settings: Arc<Settings>,
    pub registry: Arc<BalanceProviderRegistry>,
    pub session: SessionState,
    pub bootstrapper: Arc<AuthSessionBootstrapper>,
    pub backend: Arc<dyn SwapBackend>,
    pub recovery: Arc<RedirectRecoveryStore>,
}

impl AppState {
    /// Wire the production collaborators for `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, Error> {
        let settings = Settings::load(&config.settings_path)?;
        let registry = BalanceProviderRegistry::from_settings(&settings, config.request_timeout)?;

        let session = SessionState::new();
        let identity = IdentityClient::new(
            config.identity_base_url.clone(),
            config.identity_client_id.clone(),
            config.request_timeout,
        )?;
        let bootstrapper = AuthSessionBootstrapper::new(Arc::new(identity), session.clone());
        let backend = SwapApiClient::new(
            config.swap_api_base_url.clone(),
            session.clone(),
            config.request_timeout,
        )?;
        let recovery = RedirectRecoveryStore::open(&config.recovery_db_path())?;

        Ok(Self {
            config: Arc::new(config),
            settings: Arc::new(settings),
            registry: Arc::new(registry),
            session,
            bootstrapper: Arc::new(bootstrapper),
            backend: Arc::new(backend),
            recovery: Arc::new(recovery),
        })
    }

    /// End the user's session: forget the auth token and any pending
    /// redirect snapshot.
    pub async fn end_session(&self) -> Result<(), Error> {
        self.session.end().await;
        self.recovery.clear()?;
        Ok(())
    }
}
