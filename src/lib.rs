// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Swapline - Cross-Network Swap Client
//!
//! Queries balances and transfer fees across heterogeneous settlement
//! networks and drives a swap through its lifecycle against the swap backend.
//!
//! ## Modules
//!
//! - `providers` - Per-network balance/fee providers and their registry
//! - `swap` - Swap lifecycle controller, status poller and step mapping
//! - `auth` - Session state and guest-session bootstrap
//! - `backend` - Swap backend contract and HTTP client
//! - `storage` - Durable redirect recovery slot (redb)

pub mod amount;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;
pub mod swap;

pub use error::{Error, Result};
