// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable single-slot holder for the swap form snapshot taken before an
//! external redirect.
//!
//! ## Table Layout
//!
//! - `redirect_recovery`: `"pending"` → serialized SwapFormSnapshot (JSON)
//!
//! The slot is overwritten by every save and removed by the load that reads
//! it, inside the same write transaction, so a snapshot is consumed at most
//! once even across process restarts.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::{debug, info};

use crate::models::SwapFormSnapshot;

const REDIRECT_RECOVERY: TableDefinition<&str, &[u8]> = TableDefinition::new("redirect_recovery");

const PENDING_SLOT: &str = "pending";

#[derive(Debug, thiserror::Error)]
pub enum RecoveryStoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RecoveryResult<T> = Result<T, RecoveryStoreError>;

pub struct RedirectRecoveryStore {
    db: Database,
}

impl RedirectRecoveryStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> RecoveryResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RecoveryStoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so read transactions never hit a missing table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(REDIRECT_RECOVERY)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "Redirect recovery store opened");
        Ok(Self { db })
    }

    /// Persist `snapshot`, replacing any pending one.
    pub fn save(&self, snapshot: &SwapFormSnapshot) -> RecoveryResult<()> {
        let json = serde_json::to_vec(snapshot)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REDIRECT_RECOVERY)?;
            table.insert(PENDING_SLOT, json.as_slice())?;
        }
        write_txn.commit()?;

        info!(captured_at = %snapshot.captured_at, "Redirect snapshot saved");
        Ok(())
    }

    /// Take the pending snapshot, if any. Freshness is the caller's decision.
    ///
    /// A slot holding undecodable bytes is still consumed before the decode
    /// error is returned.
    pub fn load(&self) -> RecoveryResult<Option<SwapFormSnapshot>> {
        let write_txn = self.db.begin_write()?;
        let raw = {
            let mut table = write_txn.open_table(REDIRECT_RECOVERY)?;
            let removed = table.remove(PENDING_SLOT)?;
            let raw = removed.map(|guard| guard.value().to_vec());
            raw
        };
        write_txn.commit()?;

        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether a snapshot is waiting, without consuming it.
    pub fn has_pending(&self) -> RecoveryResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REDIRECT_RECOVERY)?;
        Ok(table.get(PENDING_SLOT)?.is_some())
    }

    /// Drop any pending snapshot. Idempotent.
    pub fn clear(&self) -> RecoveryResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REDIRECT_RECOVERY)?;
            table.remove(PENDING_SLOT)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
