// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::amount::AmountError;
use crate::auth::AuthError;
use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::providers::{ProviderError, RegistryError};
use crate::storage::RecoveryStoreError;
use crate::swap::ControllerError;

/// Crate-level error for callers that do not care which layer failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    RecoveryStore(#[from] RecoveryStoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
