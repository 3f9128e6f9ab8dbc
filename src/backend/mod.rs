// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Swap Backend
//!
//! Contract of the remote swap service plus its HTTP implementation.
//! Swap status is owned by the backend; this crate only reads it.

pub mod api_error;
pub mod client;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Swap, SwapIntent};

pub use api_error::{ApiError, ErrorCode, KnownErrorCode};
pub use client::SwapApiClient;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Api(ApiError),

    #[error("Swap backend request failed: {0}")]
    Transport(String),

    #[error("Swap backend response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Swap backend request timed out")]
    Timeout,
}

impl BackendError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            BackendError::Api(api) => Some(api),
            _ => None,
        }
    }
}

#[async_trait]
pub trait SwapBackend: Send + Sync {
    async fn create_swap(&self, intent: &SwapIntent) -> Result<Uuid, BackendError>;

    async fn get_swap(&self, swap_id: Uuid) -> Result<Swap, BackendError>;

    /// Resolves once the backend acknowledged the cancellation.
    async fn cancel_swap(&self, swap_id: Uuid) -> Result<(), BackendError>;

    async fn get_exchange_deposit_address(
        &self,
        exchange: &str,
        asset: &str,
    ) -> Result<String, BackendError>;
}
