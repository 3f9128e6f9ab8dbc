// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing subscriber setup.
//!
//! `LOG_FORMAT=json` switches to JSON lines; anything else gets the
//! human-readable formatter. The filter comes from `RUST_LOG` (default `info`).

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{env_or_default, LOG_FORMAT_ENV};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(service_name: &'static str) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let json = env_or_default(LOG_FORMAT_ENV, "pretty").eq_ignore_ascii_case("json");

        let builder = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true);

        // `try_init` so that a subscriber installed by a host application wins.
        let installed = if json {
            builder.json().try_init().is_ok()
        } else {
            builder.try_init().is_ok()
        };

        if installed {
            tracing::info!(service = service_name, json, "logger initialized");
        }
    });
}
