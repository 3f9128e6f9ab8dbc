// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! zkSync Lite provider.
//!
//! Talks to the node's `jsrpc` endpoint through alloy's raw request path:
//! - `account_info [address]` → `verified.balances` (token → minor units)
//! - `get_tx_fee ["Transfer", address, token]` → `totalFee` in the token's
//!   minor units (fees are paid in the transferred token)

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::Provider;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::{rpc, NetworkBalanceProvider, ProviderError};
use crate::amount::format_amount;
use crate::models::{Asset, Balance, Gas, Network};

pub const PROVIDER_NAME: &str = "zksync_lite";

/// Network identifier of zkSync Lite mainnet.
pub const ZKSYNC_MAINNET: &str = "ZKSYNC_MAINNET";

const RPC_PATH: &str = "jsrpc";

#[derive(Debug, Deserialize)]
struct AccountState {
    #[serde(default)]
    balances: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    verified: AccountState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxFee {
    total_fee: String,
}

pub struct ZkSyncLiteProvider {
    timeout: Duration,
    supported_networks: Vec<String>,
}

impl ZkSyncLiteProvider {
    /// Provider for zkSync Lite mainnet. Each RPC call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_networks(timeout, vec![ZKSYNC_MAINNET.to_string()])
    }

    /// Serve zkSync Lite style nodes for each listed network, with `timeout`
    /// applied to every node request.
    pub fn with_networks(timeout: Duration, supported_networks: Vec<String>) -> Self {
        Self {
            timeout,
            supported_networks,
        }
    }

    fn connect(&self, network: &Network) -> Result<impl Provider + Clone, ProviderError> {
        let node = rpc::primary_node(network)?;
        rpc::connect(node, rpc::endpoint(node, Some(RPC_PATH))?, Some(self.timeout))
    }
}

fn validate_address(address: &str) -> Result<(), ProviderError> {
    Address::from_str(address)
        .map(|_| ())
        .map_err(|e| ProviderError::InvalidAddress(e.to_string()))
}

#[async_trait]
impl NetworkBalanceProvider for ZkSyncLiteProvider {
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
        validate_address(address)?;
        let info: AccountInfo = self
            .connect(network)?
            .raw_request("account_info".into(), (address.to_string(),))
            .await
            .map_err(|e| ProviderError::Rpc(format!("account_info failed: {e}")))?;

        let request_time = Utc::now();
        let mut balances = Vec::with_capacity(info.verified.balances.len());
        for (token, amount) in &info.verified.balances {
            let Some(asset) = network.asset(token) else {
                debug!(network = %network.internal_name, token = %token, "Skipping undeclared token");
                continue;
            };
            balances.push(Balance {
                network: network.internal_name.clone(),
                token: token.clone(),
                amount: format_amount(amount.as_str(), i32::from(asset.decimals))?,
                decimals: asset.decimals,
                request_time,
                is_native_currency: false,
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
        validate_address(address)?;
        let fee: TxFee = self
            .connect(network)?
            .raw_request(
                "get_tx_fee".into(),
                ("Transfer".to_string(), address.to_string(), asset.asset.clone()),
            )
            .await
            .map_err(|e| ProviderError::Rpc(format!("get_tx_fee failed: {e}")))?;

        let decimals = network
            .asset(&asset.asset)
            .map(|a| a.decimals)
            .unwrap_or(asset.decimals);

        Ok(vec![Gas {
            token: asset.asset.clone(),
            gas: format_amount(fee.total_fee, i32::from(decimals))?,
            request_time: Utc::now(),
        }])
    }
}
