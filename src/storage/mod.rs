// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Durable client-side state, kept in an embedded redb database under
//! `DATA_DIR`:
//!
//! ```text
//! ${DATA_DIR}/
//!   recovery.redb    # pending redirect snapshot (single slot)
//! ```

pub mod recovery;

pub use recovery::{RecoveryResult, RecoveryStoreError, RedirectRecoveryStore};
