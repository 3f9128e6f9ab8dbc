// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Routing of balance and fee queries to the provider serving a network.
//!
//! Routing is a table lookup on exact membership in each provider's
//! `supported_networks`. Every delegated call carries its own timeout so one
//! unresponsive node cannot hold up the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, Stream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{EvmProvider, NetworkBalanceProvider, ZkSyncLiteProvider};
use crate::config::Settings;
use crate::models::{Asset, Balance, Gas, Network};

/// Per-call timeout applied when the builder is not given one.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("No provider serves network {0}")]
    NotFound(String),

    #[error("Network {network} is claimed by both {first} and {second}")]
    DuplicateNetwork {
        network: String,
        first: String,
        second: String,
    },
}

/// Ordered set of registered providers plus the network routing table.
pub struct BalanceProviderRegistry {
    providers: Vec<Arc<dyn NetworkBalanceProvider>>,
    routes: HashMap<String, usize>,
    call_timeout: Duration,
}

impl std::fmt::Debug for BalanceProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceProviderRegistry")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("routes", &self.routes.len())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl BalanceProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with the built-in provider families for a network catalogue.
    ///
    /// zkSync Lite serves its mainnet entry; every other non-exchange network
    /// with a chain id goes to the EVM provider.
    pub fn from_settings(
        settings: &Settings,
        call_timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let zksync = ZkSyncLiteProvider::new(call_timeout);
        let evm = EvmProvider::for_networks(
            settings
                .networks
                .iter()
                .filter(|n| !zksync.supported_networks().contains(&n.internal_name)),
        );

        Self::builder()
            .with_timeout(call_timeout)
            .register(zksync)
            .register(evm)
            .build()
    }

    /// The provider serving `network_id`, by exact identifier match.
    pub fn resolve(
        &self,
        network_id: &str,
    ) -> Result<Arc<dyn NetworkBalanceProvider>, RegistryError> {
        self.routes
            .get(network_id)
            .map(|&idx| Arc::clone(&self.providers[idx]))
            .ok_or_else(|| RegistryError::NotFound(network_id.to_string()))
    }

    /// Timeout applied to each delegated provider call.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Balances of `address` on `network`. Empty when no provider serves the
    /// network, the provider fails, or the call times out.
    pub async fn get_balance(&self, network: &Network, address: &str) -> Vec<Balance> {
        let Ok(provider) = self.resolve(&network.internal_name) else {
            debug!(network = %network.internal_name, "No balance provider for network");
            return Vec::new();
        };

        match timeout(self.call_timeout, provider.get_balance(network, address)).await {
            Ok(balances) => balances,
            Err(_) => {
                warn!(
                    provider = provider.name(),
                    network = %network.internal_name,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Balance query timed out"
                );
                Vec::new()
            }
        }
    }

    /// Transfer fee estimate for `asset` on `network`, with the same
    /// containment rules as [`get_balance`](Self::get_balance).
    pub async fn get_gas(&self, network: &Network, asset: &Asset, address: &str) -> Vec<Gas> {
        let Ok(provider) = self.resolve(&network.internal_name) else {
            debug!(network = %network.internal_name, "No gas provider for network");
            return Vec::new();
        };

        match timeout(self.call_timeout, provider.get_gas(network, asset, address)).await {
            Ok(gas) => gas,
            Err(_) => {
                warn!(
                    provider = provider.name(),
                    network = %network.internal_name,
                    asset = %asset.asset,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Gas query timed out"
                );
                Vec::new()
            }
        }
    }

    /// Query every network concurrently, yielding each result as it lands.
    ///
    /// Networks without a provider, failing networks and timed-out networks
    /// all yield an empty set, so the stream always produces one item per
    /// input network.
    pub fn stream_balances<'a>(
        &'a self,
        networks: &'a [Network],
        address: &'a str,
    ) -> impl Stream<Item = (String, Vec<Balance>)> + 'a {
        networks
            .iter()
            .map(|network| async move {
                let balances = self.get_balance(network, address).await;
                (network.internal_name.clone(), balances)
            })
            .collect::<FuturesUnordered<_>>()
    }
}

/// Collects providers in registration order and derives the routing table.
#[derive(Default)]
pub struct RegistryBuilder {
    providers: Vec<Arc<dyn NetworkBalanceProvider>>,
    call_timeout: Option<Duration>,
}

impl RegistryBuilder {
    /// Append a provider. Registration order decides conflicts in lenient mode.
    pub fn register(self, provider: impl NetworkBalanceProvider + 'static) -> Self {
        self.register_arc(Arc::new(provider))
    }

    pub fn register_arc(mut self, provider: Arc<dyn NetworkBalanceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    /// Build the registry, failing if two providers claim the same network.
    pub fn build(self) -> Result<BalanceProviderRegistry, RegistryError> {
        let (routes, mut conflicts) = self.route_table();
        if !conflicts.is_empty() {
            return Err(conflicts.swap_remove(0));
        }
        Ok(self.finish(routes))
    }

    /// Build the registry, letting the first registered provider win any
    /// conflicting network. Conflicts are still logged.
    pub fn build_lenient(self) -> BalanceProviderRegistry {
        let (routes, conflicts) = self.route_table();
        for conflict in &conflicts {
            if let RegistryError::DuplicateNetwork {
                network,
                first,
                second,
            } = conflict
            {
                warn!(
                    network = %network,
                    kept = %first,
                    ignored = %second,
                    "Network claimed by more than one provider"
                );
            }
        }
        self.finish(routes)
    }

    /// First-registered-wins routing plus every conflicting claim, in order.
    fn route_table(&self) -> (HashMap<String, usize>, Vec<RegistryError>) {
        let mut routes: HashMap<String, usize> = HashMap::new();
        let mut conflicts = Vec::new();

        for (idx, provider) in self.providers.iter().enumerate() {
            for network in provider.supported_networks() {
                match routes.get(network) {
                    Some(&owner) => conflicts.push(RegistryError::DuplicateNetwork {
                        network: network.clone(),
                        first: self.providers[owner].name().to_string(),
                        second: provider.name().to_string(),
                    }),
                    None => {
                        routes.insert(network.clone(), idx);
                    }
                }
            }
        }

        (routes, conflicts)
    }

    fn finish(self, routes: HashMap<String, usize>) -> BalanceProviderRegistry {
        info!(
            providers = self.providers.len(),
            networks = routes.len(),
            "Balance provider registry built"
        );

        BalanceProviderRegistry {
            providers: self.providers,
            routes,
            call_timeout: self.call_timeout.unwrap_or(DEFAULT_CALL_TIMEOUT),
        }
    }
}
