// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application, and loads the network catalogue
//! ([`Settings`]). Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SWAP_API_BASE_URL` | Swap backend base URL | `http://localhost:5000` |
//! | `IDENTITY_BASE_URL` | Identity service base URL (guest connect) | `http://localhost:5001` |
//! | `IDENTITY_CLIENT_ID` | OAuth client id used for guest connect | `swapline_ui` |
//! | `SETTINGS_PATH` | JSON network catalogue | `settings.json` |
//! | `DATA_DIR` | Directory holding the redirect recovery database | `./data` |
//! | `POLL_INTERVAL_MS` | Swap status poll interval | `2000` |
//! | `REQUEST_TIMEOUT_SECS` | Per-call HTTP/RPC timeout | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::amount::MAX_DECIMALS;
use crate::models::{Network, SwapFormValues};

pub const SWAP_API_BASE_URL_ENV: &str = "SWAP_API_BASE_URL";
pub const IDENTITY_BASE_URL_ENV: &str = "IDENTITY_BASE_URL";
pub const IDENTITY_CLIENT_ID_ENV: &str = "IDENTITY_CLIENT_ID";
pub const SETTINGS_PATH_ENV: &str = "SETTINGS_PATH";
/// Environment variable name for the data directory path.
///
/// The redirect recovery database lives here so that it survives the process
/// being torn down by an external redirect.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const POLL_INTERVAL_MS_ENV: &str = "POLL_INTERVAL_MS";
pub const REQUEST_TIMEOUT_SECS_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_SWAP_API_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_IDENTITY_BASE_URL: &str = "http://localhost:5001";
const DEFAULT_IDENTITY_CLIENT_ID: &str = "swapline_ui";
const DEFAULT_SETTINGS_PATH: &str = "settings.json";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// File name of the recovery database inside `DATA_DIR`.
pub const RECOVERY_DB_FILE: &str = "recovery.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Network `{0}` is declared more than once")]
    DuplicateNetwork(String),

    #[error("Asset {asset} on {network} declares {decimals} decimals, more than a U256 can scale")]
    InvalidDecimals {
        network: String,
        asset: String,
        decimals: u8,
    },
}

/// Process configuration read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub swap_api_base_url: String,
    pub identity_base_url: String,
    pub identity_client_id: String,
    pub settings_path: PathBuf,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            swap_api_base_url: DEFAULT_SWAP_API_BASE_URL.to_string(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            identity_client_id: DEFAULT_IDENTITY_CLIENT_ID.to_string(),
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Read every setting from the environment, falling back to the defaults
    /// above.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            swap_api_base_url: env_or_default(SWAP_API_BASE_URL_ENV, DEFAULT_SWAP_API_BASE_URL),
            identity_base_url: env_or_default(IDENTITY_BASE_URL_ENV, DEFAULT_IDENTITY_BASE_URL),
            identity_client_id: env_or_default(IDENTITY_CLIENT_ID_ENV, DEFAULT_IDENTITY_CLIENT_ID),
            settings_path: PathBuf::from(env_or_default(SETTINGS_PATH_ENV, DEFAULT_SETTINGS_PATH)),
            data_dir: PathBuf::from(env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            poll_interval: Duration::from_millis(env_u64(
                POLL_INTERVAL_MS_ENV,
                DEFAULT_POLL_INTERVAL_MS,
            )?),
            request_timeout: Duration::from_secs(env_u64(
                REQUEST_TIMEOUT_SECS_ENV,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        })
    }

    pub fn recovery_db_path(&self) -> PathBuf {
        self.data_dir.join(RECOVERY_DB_FILE)
    }
}

/// The network catalogue. Immutable once loaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub networks: Vec<Network>,
}

impl Settings {
    /// Load and validate the catalogue file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(raw)?;
        Self::new(settings.networks)
    }

    /// Validate identifiers and stamp each asset with its owning network.
    pub fn new(mut networks: Vec<Network>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for network in &mut networks {
            if !seen.insert(network.internal_name.clone()) {
                return Err(ConfigError::DuplicateNetwork(network.internal_name.clone()));
            }
            for asset in &mut network.assets {
                if asset.decimals > MAX_DECIMALS {
                    return Err(ConfigError::InvalidDecimals {
                        network: network.internal_name.clone(),
                        asset: asset.asset.clone(),
                        decimals: asset.decimals,
                    });
                }
                asset.network = network.internal_name.clone();
            }
        }
        Ok(Self { networks })
    }

    /// Exact identifier lookup.
    pub fn network(&self, internal_name: &str) -> Option<&Network> {
        self.networks
            .iter()
            .find(|n| n.internal_name == internal_name)
    }

    /// Default form values: the first queryable network as source with its
    /// first asset, nothing else preselected.
    pub fn initial_form_values(&self) -> SwapFormValues {
        let source = self.networks.iter().find(|n| n.is_queryable());
        SwapFormValues {
            from: source.map(|n| n.internal_name.clone()),
            asset: source
                .and_then(|n| n.assets.first())
                .map(|a| a.asset.clone()),
            ..SwapFormValues::default()
        }
    }

    /// Default form values pre-filled from a page URL's query.
    ///
    /// Recognised keys are `from`, `to`, `asset`, `amount` and `destAddress`.
    /// Network keys must name a catalogue entry. `asset` must be declared by
    /// the chosen source network. Anything else falls back to
    /// [`initial_form_values`](Self::initial_form_values).
    pub fn initial_form_values_for(&self, url: &Url) -> SwapFormValues {
        let mut values = self.initial_form_values();

        let param = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let known_network = |key: &str| {
            param(key).and_then(|id| {
                self.networks
                    .iter()
                    .find(|n| n.internal_name.eq_ignore_ascii_case(&id))
            })
        };

        if let Some(source) = known_network("from") {
            values.from = Some(source.internal_name.clone());
            values.asset = source.assets.first().map(|a| a.asset.clone());
        }
        if let Some(destination) = known_network("to") {
            values.to = Some(destination.internal_name.clone());
        }

        let source = values.from.as_deref().and_then(|id| self.network(id));
        if let Some(asset) = param("asset").and_then(|symbol| {
            source.and_then(|n| n.assets.iter().find(|a| a.asset.eq_ignore_ascii_case(&symbol)))
        }) {
            values.asset = Some(asset.asset.clone());
        }

        values.amount = param("amount");
        values.destination_address = param("destAddress");
        values
    }
}

pub(crate) fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOGUE: &str = r#"{
        "networks": [
            {
                "internal_name": "COINBASE",
                "display_name": "Coinbase",
                "is_exchange": true,
                "authorization_flow": "o_auth2",
                "assets": [{ "asset": "USDC", "decimals": 6 }]
            },
            {
                "internal_name": "ZKSYNC_MAINNET",
                "display_name": "zkSync Lite",
                "assets": [
                    { "asset": "ETH", "decimals": 18, "is_native": true },
                    { "asset": "USDC", "decimals": 6 }
                ],
                "nodes": [{ "url": "https://api.zksync.io/" }]
            }
        ]
    }"#;

    #[test]
    fn loads_catalogue_and_stamps_asset_network() {
        let settings = Settings::from_json(CATALOGUE).unwrap();
        assert_eq!(settings.networks.len(), 2);

        let zksync = settings.network("ZKSYNC_MAINNET").unwrap();
        assert!(zksync.assets.iter().all(|a| a.network == "ZKSYNC_MAINNET"));
        assert!(settings.network("COINBASE").unwrap().is_exchange);
        assert!(settings.network("UNKNOWN").is_none());
    }

    #[test]
    fn rejects_duplicate_networks() {
        let raw = r#"{ "networks": [
            { "internal_name": "A", "display_name": "A" },
            { "internal_name": "A", "display_name": "A again" }
        ] }"#;
        assert!(matches!(
            Settings::from_json(raw),
            Err(ConfigError::DuplicateNetwork(name)) if name == "A"
        ));
    }

    #[test]
    fn initial_form_values_pick_first_queryable_network() {
        let settings = Settings::from_json(CATALOGUE).unwrap();
        let values = settings.initial_form_values();
        assert_eq!(values.from.as_deref(), Some("ZKSYNC_MAINNET"));
        assert_eq!(values.asset.as_deref(), Some("ETH"));
        assert!(values.to.is_none());
        assert!(values.amount.is_none());
    }

    #[test]
    fn query_prefills_form_values() {
        let settings = Settings::from_json(CATALOGUE).unwrap();
        let url = Url::parse(
            "https://app.example/?from=zksync_mainnet&to=COINBASE&asset=usdc&amount=12.5&destAddress=0xabc&oauth_redirect=true",
        )
        .unwrap();

        let values = settings.initial_form_values_for(&url);
        assert_eq!(values.from.as_deref(), Some("ZKSYNC_MAINNET"));
        assert_eq!(values.to.as_deref(), Some("COINBASE"));
        assert_eq!(values.asset.as_deref(), Some("USDC"));
        assert_eq!(values.amount.as_deref(), Some("12.5"));
        assert_eq!(values.destination_address.as_deref(), Some("0xabc"));
    }

    #[test]
    fn unknown_query_values_fall_back_to_defaults() {
        let settings = Settings::from_json(CATALOGUE).unwrap();
        let url = Url::parse("https://app.example/?to=NOWHERE&asset=DOGE").unwrap();

        let values = settings.initial_form_values_for(&url);
        assert_eq!(values, settings.initial_form_values());
    }

    #[test]
    fn rejects_unrepresentable_decimals() {
        let raw = r#"{ "networks": [
            { "internal_name": "A", "display_name": "A",
              "assets": [{ "asset": "HUGE", "decimals": 78 }] }
        ] }"#;
        assert!(matches!(
            Settings::from_json(raw),
            Err(ConfigError::InvalidDecimals { asset, decimals: 78, .. }) if asset == "HUGE"
        ));

        let max = raw.replace("78", "77");
        assert!(Settings::from_json(&max).is_ok());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.recovery_db_path().ends_with(RECOVERY_DB_FILE));
    }
}
