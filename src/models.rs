// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API and the WebSocket channel. Response types derive
//! `Serialize` and `ToSchema` for JSON handling and OpenAPI documentation.
//!
//! ## Address Type
//!
//! The [`Address`] newtype wraps a Cardano address (base58 or bech32). The
//! service never interprets its contents; it is only used as a lookup key.
//!
//! ## Model Categories
//!
//! - **Records**: rows read from the database (`UtxoRecord`, `TransactionRecord`)
//! - **Requests**: JSON bodies accepted by the `POST` routes
//! - **Restore messages**: WebSocket frames of the notification channel

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Address Type
// =============================================================================

/// Opaque Cardano address.
///
/// # Example
///
/// ```rust,ignore
/// let addr = Address::from("DdzFFzCqrhsfYMUNRxtQ5NNKbWVw3ZJBNcMLLZSoqmD5trHHPBDwsjonoBgw1K6e8Qi8bEMs5Y62yZfReEVSFFMncFYDUHUTMM436KjQ");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Address(pub String);

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address(value.to_string())
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

// =============================================================================
// Records
// =============================================================================

/// An unspent transaction output, uniquely identified by `(tx_hash, tx_index)`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UtxoRecord {
    pub utxo_id: String,
    pub tx_hash: String,
    pub tx_index: i32,
    pub receiver: Address,
    /// Amount in lovelace, serialized as a decimal string.
    pub amount: Decimal,
}

/// `tx_state` of transactions not yet in a block.
pub const TX_STATE_PENDING: &str = "Pending";

/// A transaction touching one or more addresses.
///
/// `inputs_address[i]` pairs with `inputs_amount[i]`; the same holds for
/// outputs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: String,
    pub inputs_address: Vec<Address>,
    pub inputs_amount: Vec<Decimal>,
    pub outputs_address: Vec<Address>,
    pub outputs_amount: Vec<Decimal>,
    /// Block height as a string; absent while the transaction is pending.
    pub block_num: Option<String>,
    /// Block time; absent for transactions not yet in a block.
    pub time: Option<DateTime<Utc>>,
    pub tx_state: String,
    /// Pagination key for the history endpoint.
    pub last_update: DateTime<Utc>,
    pub best_block_num: Option<String>,
}

// =============================================================================
// Requests
// =============================================================================

/// Body of every address-list route.
///
/// `addresses` is optional at the serde level so that a missing field reaches
/// validation and yields the documented message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AddressesRequest {
    #[serde(default)]
    pub addresses: Option<Vec<Address>>,
}

/// Body of `POST /api/v2/txs/history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TxHistoryRequest {
    #[serde(default)]
    pub addresses: Option<Vec<Address>>,
    /// Lower bound on `last_update`, any common datetime format.
    #[serde(default)]
    pub date_from: Option<String>,
    /// Hash of the last transaction already seen at `date_from`.
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Body of `POST /api/v2/txs/signed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedTxRequest {
    #[serde(default)]
    pub signed_tx: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Response of `POST /api/v2/txs/utxoSumForAddresses`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UtxoSumResponse {
    pub sum: Decimal,
}

/// Response of `GET /api/v2/healthcheck`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct HealthcheckResponse {
    pub version: String,
}

// =============================================================================
// Restore Messages (WebSocket)
// =============================================================================

/// Message type of the restore request and its responses.
pub const MSG_TYPE_RESTORE: &str = "RESTORE";

/// Inbound WebSocket frame. Only `msg` is inspected.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub msg: String,
}

/// Outbound restore frame carrying one chunk of addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestoreMessage {
    pub msg: String,
    pub step: usize,
    pub addresses: Vec<Address>,
}
