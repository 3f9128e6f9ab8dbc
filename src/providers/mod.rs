// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Network Balance Providers
//!
//! One provider per network family, each owning the wire-level specifics of
//! its RPC dialect:
//!
//! - [`ZkSyncLiteProvider`] - `account_info` / `get_tx_fee` JSON-RPC
//! - [`EvmProvider`] - standard EVM RPC (`eth_getBalance`, ERC-20 `balanceOf`)
//!
//! Providers are routed by [`BalanceProviderRegistry`] using their
//! `supported_networks`. Balance data is best effort: failures are logged
//! and surface as empty results, never as errors to the caller.

pub mod evm;
pub mod registry;
mod rpc;
pub mod zksync;

use async_trait::async_trait;
use tracing::warn;

use crate::amount::AmountError;
use crate::models::{Asset, Balance, Gas, Network};

pub use evm::EvmProvider;
pub use registry::{BalanceProviderRegistry, RegistryBuilder, RegistryError};
pub use zksync::ZkSyncLiteProvider;

/// Errors raised inside a provider. They never leave the provider boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network {0} has no RPC node configured")]
    MissingNode(String),

    #[error("Network {0} declares no native asset")]
    MissingNativeAsset(String),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid node auth header: {0}")]
    InvalidAuthHeader(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Balance and fee capability for one family of networks.
///
/// Implementors provide the fallible `fetch_*` methods; callers use the
/// `get_*` methods, which skip unqueryable networks and contain failures.
#[async_trait]
pub trait NetworkBalanceProvider: Send + Sync {
    /// Stable identifier of the provider family.
    fn name(&self) -> &str;

    /// Network identifiers this provider serves, in declaration order.
    fn supported_networks(&self) -> &[String];

    async fn fetch_balances(
        &self,
        network: &Network,
        address: &str,
    ) -> Result<Vec<Balance>, ProviderError>;

    async fn fetch_gas(
        &self,
        network: &Network,
        asset: &Asset,
        address: &str,
    ) -> Result<Vec<Gas>, ProviderError>;

    /// Current balances for every asset the network declares.
    async fn get_balance(&self, network: &Network, address: &str) -> Vec<Balance> {
        if !network.is_queryable() {
            return Vec::new();
        }

        match self.fetch_balances(network, address).await {
            Ok(balances) => balances,
            Err(e) => {
                warn!(
                    provider = self.name(),
                    network = %network.internal_name,
                    error = %e,
                    "Balance query failed"
                );
                Vec::new()
            }
        }
    }

    /// Estimated transfer fee for `asset` sent from `address`.
    async fn get_gas(&self, network: &Network, asset: &Asset, address: &str) -> Vec<Gas> {
        if !network.is_queryable() {
            return Vec::new();
        }

        match self.fetch_gas(network, asset, address).await {
            Ok(gas) => gas,
            Err(e) => {
                warn!(
                    provider = self.name(),
                    network = %network.internal_name,
                    asset = %asset.asset,
                    error = %e,
                    "Gas query failed"
                );
                Vec::new()
            }
        }
    }
}
