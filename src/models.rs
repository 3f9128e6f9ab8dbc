// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Shared data structures for networks, balances, swaps and the swap form.
//!
//! ## Model Categories
//!
//! - **Catalogue**: [`Network`], [`Asset`], [`RpcNode`] (immutable, loaded once)
//! - **Queries**: [`Balance`], [`Gas`] (created fresh on every query)
//! - **Swaps**: [`Swap`], [`SwapStatus`], [`SwapAdditionalData`] (server-owned)
//! - **Form**: [`SwapFormValues`], [`SwapFormSnapshot`], [`SwapIntent`]

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Network Catalogue
// =============================================================================

/// How a network authorizes access to the user's account, if at all.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationFlow {
    #[default]
    None,
    /// The user approves access on the provider's own page (exchange OAuth).
    #[serde(rename = "o_auth2")]
    OAuth2,
}

/// RPC endpoint descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcNode {
    pub url: String,
    /// Optional `Authorization` header value sent with every call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<String>,
}

/// A transferable unit of value native to a network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    /// Ticker symbol (e.g. "ETH", "USDC")
    pub asset: String,
    /// Decimal precision of the minor unit
    pub decimals: u8,
    /// ERC-20 contract address (None for native assets and non-EVM tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    /// Whether this asset is the network's fee-paying native currency
    #[serde(default)]
    pub is_native: bool,
    /// Owning network identifier, filled in when the catalogue is loaded
    #[serde(default)]
    pub network: String,
}

/// A settlement venue: an on-chain network or an exchange account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    /// Unique, stable identifier
    pub internal_name: String,
    pub display_name: String,
    #[serde(default)]
    pub is_exchange: bool,
    #[serde(default)]
    pub authorization_flow: AuthorizationFlow,
    /// EVM chain id, when applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub nodes: Vec<RpcNode>,
}

impl Network {
    pub fn asset(&self, symbol: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.asset == symbol)
    }

    pub fn native_asset(&self) -> Option<&Asset> {
        self.assets.iter().find(|a| a.is_native)
    }

    pub fn primary_node(&self) -> Option<&RpcNode> {
        self.nodes.first()
    }

    pub fn requires_oauth(&self) -> bool {
        self.authorization_flow == AuthorizationFlow::OAuth2
    }

    /// Whether the client can query balances on this network at all.
    pub fn is_queryable(&self) -> bool {
        !self.is_exchange && !self.assets.is_empty() && !self.nodes.is_empty()
    }
}

// =============================================================================
// Balance / Gas
// =============================================================================

/// Balance of one asset on one network at query time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    pub network: String,
    pub token: String,
    /// Decimal amount, already scaled by `decimals`
    pub amount: String,
    pub decimals: u8,
    pub request_time: DateTime<Utc>,
    pub is_native_currency: bool,
}

/// Estimated transfer fee for one asset on one network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gas {
    pub token: String,
    /// Decimal fee amount
    pub gas: String,
    pub request_time: DateTime<Utc>,
}

// =============================================================================
// Swaps
// =============================================================================

/// Authoritative swap status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapStatus {
    Created,
    UserTransferPending,
    UserTransferDelayed,
    DepositDetected,
    LsTransferPending,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Created => "created",
            SwapStatus::UserTransferPending => "user_transfer_pending",
            SwapStatus::UserTransferDelayed => "user_transfer_delayed",
            SwapStatus::DepositDetected => "deposit_detected",
            SwapStatus::LsTransferPending => "ls_transfer_pending",
            SwapStatus::Completed => "completed",
            SwapStatus::Failed => "failed",
            SwapStatus::Expired => "expired",
            SwapStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized swap status: {0}")]
pub struct UnknownSwapStatus(pub String);

impl FromStr for SwapStatus {
    type Err = UnknownSwapStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let status = match normalized.as_str() {
            "created" => SwapStatus::Created,
            "user_transfer_pending" => SwapStatus::UserTransferPending,
            "user_transfer_delayed" => SwapStatus::UserTransferDelayed,
            "deposit_detected" => SwapStatus::DepositDetected,
            "ls_transfer_pending" => SwapStatus::LsTransferPending,
            "completed" => SwapStatus::Completed,
            "failed" => SwapStatus::Failed,
            "expired" => SwapStatus::Expired,
            "cancelled" => SwapStatus::Cancelled,
            _ => return Err(UnknownSwapStatus(s.to_string())),
        };
        Ok(status)
    }
}

/// Deposit target details assigned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwapAdditionalData {
    #[serde(default)]
    pub deposit_address: Option<String>,
    /// Memo / remarks the user must attach to the transfer
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub chain_display_name: Option<String>,
}

/// A cross-network transfer tracked by the backend.
///
/// The status string is kept verbatim so that values this client does not
/// know about survive deserialization; see [`Swap::status`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Swap {
    pub id: Uuid,
    pub requested_amount: String,
    pub source_network: String,
    pub source_asset: String,
    pub destination_network: String,
    pub destination_asset: String,
    #[serde(default)]
    pub destination_address: Option<String>,
    pub status: String,
    #[serde(default)]
    pub additional_data: Option<SwapAdditionalData>,
}

impl Swap {
    /// Parsed status. Unknown values are returned as-is in the error.
    pub fn status(&self) -> Result<SwapStatus, UnknownSwapStatus> {
        self.status.parse()
    }

    pub fn deposit_address(&self) -> Option<&str> {
        self.additional_data
            .as_ref()
            .and_then(|d| d.deposit_address.as_deref())
    }
}

// =============================================================================
// Swap Form
// =============================================================================

/// In-progress swap form values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwapFormValues {
    #[serde(default)]
    pub amount: Option<String>,
    /// Source network identifier
    #[serde(default)]
    pub from: Option<String>,
    /// Destination network identifier
    #[serde(default)]
    pub to: Option<String>,
    /// Asset symbol moved across the swap
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub destination_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Swap form is missing `{0}`")]
pub struct MissingFormField(pub &'static str);

/// A validated request to create a swap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwapIntent {
    pub amount: String,
    pub source_network: String,
    pub source_asset: String,
    pub destination_network: String,
    pub destination_asset: String,
    pub destination_address: String,
}

impl SwapFormValues {
    /// Build a swap intent. The same asset symbol is used on both sides.
    pub fn to_intent(&self) -> Result<SwapIntent, MissingFormField> {
        fn required<'a>(
            value: &'a Option<String>,
            name: &'static str,
        ) -> Result<&'a str, MissingFormField> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or(MissingFormField(name))
        }

        let asset = required(&self.asset, "asset")?;
        Ok(SwapIntent {
            amount: required(&self.amount, "amount")?.to_string(),
            source_network: required(&self.from, "from")?.to_string(),
            source_asset: asset.to_string(),
            destination_network: required(&self.to, "to")?.to_string(),
            destination_asset: asset.to_string(),
            destination_address: required(&self.destination_address, "destination_address")?
                .to_string(),
        })
    }
}

/// How long a redirect snapshot stays resumable, in seconds.
pub const SNAPSHOT_FRESHNESS_SECS: i64 = 5 * 60;

/// Form values captured before navigating to an external page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwapFormSnapshot {
    pub swap_form_values: SwapFormValues,
    pub captured_at: DateTime<Utc>,
}

impl SwapFormSnapshot {
    /// Snapshot of `values` stamped with `now`.
    pub fn capture(values: SwapFormValues, now: DateTime<Utc>) -> Self {
        Self {
            swap_form_values: values,
            captured_at: now,
        }
    }

    /// Fresh while `now - captured_at` is at most five minutes.
    /// A capture time in the future (clock skew) counts as fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.captured_at) <= Duration::seconds(SNAPSHOT_FRESHNESS_SECS)
    }
}
