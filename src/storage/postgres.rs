// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `PostgreSQL` gateway over the importer's chain tables.
//!
//! # Table Schema
//!
//! The tables are created and filled by the importer; this service only reads.
//!
//! ```sql
//! CREATE TABLE txs (
//!     hash TEXT PRIMARY KEY,
//!     inputs_address TEXT[] NOT NULL,
//!     inputs_amount BIGINT[] NOT NULL,
//!     outputs_address TEXT[] NOT NULL,
//!     outputs_amount BIGINT[] NOT NULL,
//!     block_num BIGINT,
//!     time TIMESTAMPTZ,
//!     tx_state TEXT NOT NULL,
//!     last_update TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX ON txs (last_update, hash);
//!
//! CREATE TABLE tx_addresses (tx_hash TEXT NOT NULL, address TEXT NOT NULL);
//! CREATE INDEX ON tx_addresses (address);
//!
//! CREATE TABLE utxos (
//!     utxo_id TEXT PRIMARY KEY,
//!     tx_hash TEXT NOT NULL,
//!     tx_index INTEGER NOT NULL,
//!     receiver TEXT NOT NULL,
//!     amount BIGINT NOT NULL
//! );
//!
//! CREATE TABLE bestblock (best_block_num BIGINT NOT NULL);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{HistoryQuery, StorageError, StorageResult, TxRepository};
use crate::config::DbConfig;
use crate::models::{Address, TransactionRecord, UtxoRecord, TX_STATE_PENDING};

/// Columns shared by the history and pending queries.
const TX_COLUMNS: &str = r#"
    txs.hash,
    txs.inputs_address,
    txs.inputs_amount::numeric[] AS inputs_amount,
    txs.outputs_address,
    txs.outputs_amount::numeric[] AS outputs_amount,
    txs.block_num::text AS block_num,
    txs.time,
    txs.tx_state,
    txs.last_update,
    (SELECT best_block_num::text FROM bestblock LIMIT 1) AS best_block_num
"#;

const FILTER_USED_SQL: &str =
    "SELECT DISTINCT address FROM tx_addresses WHERE address = ANY($1)";

const UTXO_SQL: &str = r#"
    SELECT utxo_id, tx_hash, tx_index, receiver, amount::numeric AS amount
    FROM utxos
    WHERE receiver = ANY($1)
    ORDER BY tx_hash, tx_index
"#;

const UTXO_SUM_SQL: &str =
    "SELECT COALESCE(SUM(amount), 0)::numeric FROM utxos WHERE receiver = ANY($1)";

const UNSPENT_ADDRESSES_SQL: &str = "SELECT DISTINCT receiver FROM utxos";

const BEST_BLOCK_SQL: &str = "SELECT best_block_num::bigint FROM bestblock LIMIT 1";

fn history_sql() -> String {
    format!(
        r#"SELECT {TX_COLUMNS}
        FROM txs
        WHERE txs.hash IN (SELECT tx_hash FROM tx_addresses WHERE address = ANY($1))
          AND (
            txs.last_update > $2
            OR (txs.last_update = $2 AND ($3::text IS NULL OR txs.hash > $3))
          )
        ORDER BY txs.last_update ASC, txs.hash ASC
        LIMIT $4"#
    )
}

fn pending_sql() -> String {
    format!(
        r#"SELECT {TX_COLUMNS}
        FROM txs
        WHERE txs.tx_state = $2
          AND txs.hash IN (SELECT tx_hash FROM tx_addresses WHERE address = ANY($1))
        ORDER BY txs.last_update ASC, txs.hash ASC"#
    )
}

#[derive(sqlx::FromRow)]
struct UtxoRow {
    utxo_id: String,
    tx_hash: String,
    tx_index: i32,
    receiver: String,
    amount: Decimal,
}

impl From<UtxoRow> for UtxoRecord {
    fn from(row: UtxoRow) -> Self {
        UtxoRecord {
            utxo_id: row.utxo_id,
            tx_hash: row.tx_hash,
            tx_index: row.tx_index,
            receiver: Address(row.receiver),
            amount: row.amount,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TxRow {
    hash: String,
    inputs_address: Vec<String>,
    inputs_amount: Vec<Decimal>,
    outputs_address: Vec<String>,
    outputs_amount: Vec<Decimal>,
    block_num: Option<String>,
    time: Option<DateTime<Utc>>,
    tx_state: String,
    last_update: DateTime<Utc>,
    best_block_num: Option<String>,
}

impl TryFrom<TxRow> for TransactionRecord {
    type Error = StorageError;

    fn try_from(row: TxRow) -> Result<Self, Self::Error> {
        if row.inputs_address.len() != row.inputs_amount.len()
            || row.outputs_address.len() != row.outputs_amount.len()
        {
            return Err(StorageError::Decode(format!(
                "address/amount arrays differ in length for tx {}",
                row.hash
            )));
        }
        Ok(TransactionRecord {
            hash: row.hash,
            inputs_address: row.inputs_address.into_iter().map(Address).collect(),
            inputs_amount: row.inputs_amount,
            outputs_address: row.outputs_address.into_iter().map(Address).collect(),
            outputs_amount: row.outputs_amount,
            block_num: row.block_num,
            time: row.time,
            tx_state: row.tx_state,
            last_update: row.last_update,
            best_block_num: row.best_block_num,
        })
    }
}

fn bind_addresses(addresses: &[Address]) -> Vec<String> {
    addresses.iter().map(|a| a.0.clone()).collect()
}

fn into_records(rows: Vec<TxRow>) -> StorageResult<Vec<TransactionRecord>> {
    rows.into_iter().map(TransactionRecord::try_from).collect()
}

/// Open the pool and probe the connection with `SELECT NOW()`.
pub async fn connect(config: &DbConfig) -> StorageResult<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .idle_timeout(Duration::from_millis(config.idle_timeout_ms))
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .connect(&config.url)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    sqlx::query("SELECT NOW()")
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(pool)
}

/// Query gateway sharing one connection pool across requests.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxRepository for PgRepository {
    async fn filter_used_addresses(&self, addresses: &[Address]) -> StorageResult<Vec<Address>> {
        let rows: Vec<(String,)> = sqlx::query_as(FILTER_USED_SQL)
            .bind(bind_addresses(addresses))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(address,)| Address(address)).collect())
    }

    async fn utxo_for_addresses(&self, addresses: &[Address]) -> StorageResult<Vec<UtxoRecord>> {
        let rows: Vec<UtxoRow> = sqlx::query_as(UTXO_SQL)
            .bind(bind_addresses(addresses))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(UtxoRecord::from).collect())
    }

    async fn utxo_sum_for_addresses(&self, addresses: &[Address]) -> StorageResult<Decimal> {
        let (sum,): (Decimal,) = sqlx::query_as(UTXO_SUM_SQL)
            .bind(bind_addresses(addresses))
            .fetch_one(&self.pool)
            .await?;
        Ok(sum)
    }

    async fn transactions_history(
        &self,
        query: HistoryQuery<'_>,
    ) -> StorageResult<Vec<TransactionRecord>> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows: Vec<TxRow> = sqlx::query_as(&history_sql())
            .bind(bind_addresses(query.addresses))
            .bind(query.date_from)
            .bind(query.cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn pending_transactions(
        &self,
        addresses: &[Address],
    ) -> StorageResult<Vec<TransactionRecord>> {
        let rows: Vec<TxRow> = sqlx::query_as(&pending_sql())
            .bind(bind_addresses(addresses))
            .bind(TX_STATE_PENDING)
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn unspent_addresses(&self) -> StorageResult<Vec<Address>> {
        let rows: Vec<(String,)> = sqlx::query_as(UNSPENT_ADDRESSES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(address,)| Address(address)).collect())
    }

    async fn best_block(&self) -> StorageResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(BEST_BLOCK_SQL)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(block,)| block))
    }
}
