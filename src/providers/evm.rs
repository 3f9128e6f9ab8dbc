// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Standard EVM RPC provider.
//!
//! - Native balance: `eth_getBalance`
//! - ERC-20 balance: `balanceOf(address)` on the asset's contract
//! - Fee estimate: `eth_gasPrice` times a fixed transfer gas limit, quoted in
//!   the network's native asset

use std::str::FromStr;

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::{rpc, NetworkBalanceProvider, ProviderError};
use crate::amount::format_units;
use crate::models::{Asset, Balance, Gas, Network};

pub const PROVIDER_NAME: &str = "evm";

/// Gas used by a plain value transfer.
const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Conservative gas limit for an ERC-20 `transfer`.
const TOKEN_TRANSFER_GAS: u64 = 65_000;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// EVM provider serving every network listed at construction.
pub struct EvmProvider {
    supported_networks: Vec<String>,
}

impl EvmProvider {
    /// Provider serving exactly the given network identifiers.
    pub fn new(supported_networks: Vec<String>) -> Self {
        Self { supported_networks }
    }

    /// Serve every non-exchange network in `networks` that declares a chain id.
    pub fn for_networks<'a>(networks: impl IntoIterator<Item = &'a Network>) -> Self {
        Self::new(
            networks
                .into_iter()
                .filter(|n| !n.is_exchange && n.chain_id.is_some())
                .map(|n| n.internal_name.clone())
                .collect(),
        )
    }
}

fn parse_address(address: &str) -> Result<Address, ProviderError> {
    Address::from_str(address).map_err(|e| ProviderError::InvalidAddress(e.to_string()))
}

fn connect(network: &Network) -> Result<impl Provider + Clone, ProviderError> {
    let node = rpc::primary_node(network)?;
    rpc::connect(node, rpc::endpoint(node, None)?, None)
}

async fn token_balance<P: Provider + Clone>(
    provider: &P,
    contract_address: &str,
    owner: Address,
) -> Result<U256, ProviderError> {
    let token = parse_address(contract_address)?;
    IERC20::new(token, provider.clone())
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| ProviderError::Contract(e.to_string()))
}

#[async_trait]
impl NetworkBalanceProvider for EvmProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn supported_networks(&self) -> &[String] {
        &self.supported_networks
    }

    async fn fetch_balances(
        &self,
        network: &Network,
        address: &str,
    ) -> Result<Vec<Balance>, ProviderError> {
        let owner = parse_address(address)?;
        let provider = connect(network)?;
        let request_time = Utc::now();

        let mut balances = Vec::with_capacity(network.assets.len());
        for asset in &network.assets {
            let raw = match (asset.is_native, asset.contract_address.as_deref()) {
                (true, _) => provider
                    .get_balance(owner)
                    .await
                    .map_err(|e| ProviderError::Rpc(e.to_string()))?,
                (false, Some(contract)) => {
                    match token_balance(&provider, contract, owner).await {
                        Ok(raw) => raw,
                        Err(e) => {
                            // One broken token contract should not hide the rest.
                            warn!(
                                network = %network.internal_name,
                                token = %asset.asset,
                                error = %e,
                                "Failed to get token balance"
                            );
                            continue;
                        }
                    }
                }
                (false, None) => {
                    debug!(
                        network = %network.internal_name,
                        token = %asset.asset,
                        "Asset has no contract address, skipping"
                    );
                    continue;
                }
            };

            balances.push(Balance {
                network: network.internal_name.clone(),
                token: asset.asset.clone(),
                amount: format_units(raw, asset.decimals),
                decimals: asset.decimals,
                request_time,
                is_native_currency: asset.is_native,
            });
        }

        Ok(balances)
    }

    async fn fetch_gas(
        &self,
        network: &Network,
        asset: &Asset,
        address: &str,
    ) -> Result<Vec<Gas>, ProviderError> {
        parse_address(address)?;
        let native = network
            .native_asset()
            .ok_or_else(|| ProviderError::MissingNativeAsset(network.internal_name.clone()))?;
        let provider = connect(network)?;

        let gas_price = provider
            .get_gas_price()
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;

        let gas_limit = if asset.is_native {
            NATIVE_TRANSFER_GAS
        } else {
            TOKEN_TRANSFER_GAS
        };
        let fee = U256::from(gas_price) * U256::from(gas_limit);

        Ok(vec![Gas {
            token: native.asset.clone(),
            gas: format_units(fee, native.decimals),
            request_time: Utc::now(),
        }])
    }
}
