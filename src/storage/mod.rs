// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Read-only access to the chain tables populated by the external importer.
//! Every operation is a single parameterised statement; no transaction spans
//! more than one query.
//!
//! ## Implementations
//!
//! - [`PgRepository`]: production gateway over a pooled `sqlx::PgPool`
//! - [`InMemoryStore`]: same semantics over in-process collections, used for
//!   `STORAGE_MODE=memory` (optionally seeded from `MEMORY_SEED_FILE`) and tests
//!
//! ## History Cursor
//!
//! History rows are ordered by `(last_update, hash)` ascending. Without a
//! cursor every row with `last_update >= date_from` qualifies. With a cursor
//! hash the bound becomes exclusive on the composite key:
//! `last_update > date_from OR (last_update = date_from AND hash > cursor)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{Address, TransactionRecord, UtxoRecord};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryStore, MemorySeed};
pub use postgres::PgRepository;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("unexpected row data: {0}")]
    Decode(String),

    #[error("memory seed {path} could not be loaded: {reason}")]
    Seed { path: String, reason: String },
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Connection(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Decode(error.to_string())
            }
            other => StorageError::Query(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Keyset position for the history query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery<'a> {
    pub addresses: &'a [Address],
    pub date_from: DateTime<Utc>,
    /// Last hash already returned at `date_from`.
    pub cursor: Option<&'a str>,
    pub limit: usize,
}

impl HistoryQuery<'_> {
    /// Whether a row keyed by `(last_update, hash)` lies after the cursor.
    pub fn admits(&self, last_update: DateTime<Utc>, hash: &str) -> bool {
        match self.cursor {
            None => last_update >= self.date_from,
            Some(cursor) => {
                last_update > self.date_from || (last_update == self.date_from && hash > cursor)
            }
        }
    }
}

/// Query operations backing the HTTP and WebSocket routes.
#[async_trait]
pub trait TxRepository: Send + Sync {
    /// Input addresses present in the address-usage index, each at most once.
    async fn filter_used_addresses(&self, addresses: &[Address]) -> StorageResult<Vec<Address>>;

    /// Unspent outputs received by any of the addresses.
    async fn utxo_for_addresses(&self, addresses: &[Address]) -> StorageResult<Vec<UtxoRecord>>;

    /// Sum of unspent amounts; zero when nothing matches.
    async fn utxo_sum_for_addresses(&self, addresses: &[Address]) -> StorageResult<Decimal>;

    /// One page of transactions touching the addresses, see the module docs.
    async fn transactions_history(
        &self,
        query: HistoryQuery<'_>,
    ) -> StorageResult<Vec<TransactionRecord>>;

    /// Unconfirmed transactions touching the addresses, oldest first.
    async fn pending_transactions(
        &self,
        addresses: &[Address],
    ) -> StorageResult<Vec<TransactionRecord>>;

    /// Every distinct address currently holding an unspent output.
    async fn unspent_addresses(&self) -> StorageResult<Vec<Address>>;

    /// Highest indexed block, if the importer has recorded one.
    async fn best_block(&self) -> StorageResult<Option<i64>>;
}
