// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory chain tables.
//!
//! Mirrors the PostgreSQL gateway query-for-query so the service can run
//! without a database (`STORAGE_MODE=memory`) and so route tests exercise the
//! same contract as production.
//!
//! At startup the store is filled from the JSON file named by
//! `MEMORY_SEED_FILE`:
//!
//! ```json
//! {
//!   "best_block": 116200,
//!   "transactions": [{"hash": "...", "inputs_address": ["A"], "inputs_amount": ["10"],
//!                     "outputs_address": ["B"], "outputs_amount": ["5"],
//!                     "block_num": "116147", "time": "2018-07-13T16:40:00Z",
//!                     "tx_state": "Successful", "last_update": "2018-07-13T16:40:00Z"}],
//!   "utxos": [{"utxo_id": "...", "tx_hash": "...", "tx_index": 0, "receiver": "B", "amount": "5"}]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{HistoryQuery, StorageError, StorageResult, TxRepository};
use crate::models::{Address, TransactionRecord, UtxoRecord, TX_STATE_PENDING};

/// Chain rows loaded into an [`InMemoryStore`]. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySeed {
    #[serde(default)]
    pub best_block: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub utxos: Vec<UtxoRecord>,
}

#[derive(Default)]
struct Tables {
    txs: HashMap<String, TransactionRecord>,
    /// Address-usage index: address → hashes of transactions referencing it.
    tx_addresses: HashMap<Address, BTreeSet<String>>,
    /// Keyed by `(tx_hash, tx_index)`.
    utxos: BTreeMap<(String, i32), UtxoRecord>,
    best_block: Option<i64>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_seed(seed: MemorySeed) -> Self {
        let store = Self::new();
        for tx in seed.transactions {
            store.insert_transaction(tx).await;
        }
        for utxo in seed.utxos {
            store.insert_utxo(utxo).await;
        }
        if let Some(block) = seed.best_block {
            store.set_best_block(block).await;
        }
        store
    }

    /// Read a [`MemorySeed`] JSON file and build the store from it.
    pub async fn load_seed(path: &Path) -> StorageResult<Self> {
        let seed_error = |reason: String| StorageError::Seed {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
        let seed: MemorySeed = serde_json::from_str(&raw).map_err(|e| seed_error(e.to_string()))?;
        Ok(Self::from_seed(seed).await)
    }

    /// Insert or replace a transaction and index every address it references.
    pub async fn insert_transaction(&self, tx: TransactionRecord) {
        let mut tables = self.tables.write().await;
        for address in tx.inputs_address.iter().chain(tx.outputs_address.iter()) {
            tables
                .tx_addresses
                .entry(address.clone())
                .or_default()
                .insert(tx.hash.clone());
        }
        tables.txs.insert(tx.hash.clone(), tx);
    }

    /// Insert or replace an unspent output.
    pub async fn insert_utxo(&self, utxo: UtxoRecord) {
        let mut tables = self.tables.write().await;
        tables
            .utxos
            .insert((utxo.tx_hash.clone(), utxo.tx_index), utxo);
    }

    /// Mark an output as spent.
    pub async fn remove_utxo(&self, tx_hash: &str, tx_index: i32) -> Option<UtxoRecord> {
        let mut tables = self.tables.write().await;
        tables.utxos.remove(&(tx_hash.to_string(), tx_index))
    }

    pub async fn set_best_block(&self, block: i64) {
        self.tables.write().await.best_block = Some(block);
    }
}

impl Tables {
    /// Hashes of every transaction touching any of the addresses, deduplicated.
    fn hashes_for(&self, addresses: &[Address]) -> BTreeSet<&str> {
        addresses
            .iter()
            .filter_map(|address| self.tx_addresses.get(address))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    fn with_best_block(&self, tx: &TransactionRecord) -> TransactionRecord {
        let mut row = tx.clone();
        row.best_block_num = self.best_block.map(|block| block.to_string());
        row
    }

    fn matching_utxos<'a>(&'a self, addresses: &[Address]) -> impl Iterator<Item = &'a UtxoRecord> {
        let wanted: HashSet<Address> = addresses.iter().cloned().collect();
        self.utxos
            .values()
            .filter(move |utxo| wanted.contains(&utxo.receiver))
    }
}

#[async_trait]
impl TxRepository for InMemoryStore {
    async fn filter_used_addresses(&self, addresses: &[Address]) -> StorageResult<Vec<Address>> {
        let tables = self.tables.read().await;
        let mut seen = HashSet::new();
        Ok(addresses
            .iter()
            .filter(|address| tables.tx_addresses.contains_key(*address))
            .filter(|address| seen.insert(*address))
            .cloned()
            .collect())
    }

    async fn utxo_for_addresses(&self, addresses: &[Address]) -> StorageResult<Vec<UtxoRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.matching_utxos(addresses).cloned().collect())
    }

    async fn utxo_sum_for_addresses(&self, addresses: &[Address]) -> StorageResult<Decimal> {
        let tables = self.tables.read().await;
        Ok(tables
            .matching_utxos(addresses)
            .map(|utxo| utxo.amount)
            .sum())
    }

    async fn transactions_history(
        &self,
        query: HistoryQuery<'_>,
    ) -> StorageResult<Vec<TransactionRecord>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&TransactionRecord> = tables
            .hashes_for(query.addresses)
            .into_iter()
            .filter_map(|hash| tables.txs.get(hash))
            .filter(|tx| query.admits(tx.last_update, &tx.hash))
            .collect();
        rows.sort_by(|a, b| (a.last_update, &a.hash).cmp(&(b.last_update, &b.hash)));
        Ok(rows
            .into_iter()
            .take(query.limit)
            .map(|tx| tables.with_best_block(tx))
            .collect())
    }

    async fn pending_transactions(
        &self,
        addresses: &[Address],
    ) -> StorageResult<Vec<TransactionRecord>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&TransactionRecord> = tables
            .hashes_for(addresses)
            .into_iter()
            .filter_map(|hash| tables.txs.get(hash))
            .filter(|tx| tx.tx_state == TX_STATE_PENDING)
            .collect();
        rows.sort_by(|a, b| (a.last_update, &a.hash).cmp(&(b.last_update, &b.hash)));
        Ok(rows.into_iter().map(|tx| tables.with_best_block(tx)).collect())
    }

    async fn unspent_addresses(&self) -> StorageResult<Vec<Address>> {
        let tables = self.tables.read().await;
        let distinct: BTreeSet<&Address> = tables.utxos.values().map(|utxo| &utxo.receiver).collect();
        Ok(distinct.into_iter().cloned().collect())
    }

    async fn best_block(&self) -> StorageResult<Option<i64>> {
        Ok(self.tables.read().await.best_block)
    }
}
