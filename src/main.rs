// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, process};

use futures::StreamExt;
use tracing::{error, info};

use swapline::config::AppConfig;
use swapline::logging::init_logging;
use swapline::models::Network;
use swapline::providers::RegistryError;
use swapline::state::AppState;

const USAGE: &str = "usage: swapline <network|all> <address>";

#[tokio::main]
async fn main() {
    init_logging("swapline");

    let args: Vec<String> = env::args().skip(1).collect();
    let [network, address] = args.as_slice() else {
        eprintln!("{USAGE}");
        process::exit(2);
    };

    if let Err(e) = run(network, address).await {
        error!(error = %e, "swapline failed");
        process::exit(1);
    }
}

async fn run(network_id: &str, address: &str) -> swapline::Result<()> {
    let state = AppState::from_config(AppConfig::from_env()?)?;

    let networks: Vec<Network> = if network_id.eq_ignore_ascii_case("all") {
        state.settings.networks.clone()
    } else {
        let network = state
            .settings
            .network(network_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(network_id.to_string()))?;
        vec![network]
    };

    info!(networks = networks.len(), address, "Querying balances");

    let mut balances = state.registry.stream_balances(&networks, address);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            next = balances.next() => {
                let Some((network, balances)) = next else { break };
                let line = serde_json::json!({ "network": network, "balances": balances });
                println!("{line}");
            }
            _ = &mut ctrl_c => {
                info!("Interrupted; stopping");
                break;
            }
        }
    }

    Ok(())
}
