// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cardano History API - address and transaction history backend
//!
//! This crate serves wallet clients with UTXO, balance and transaction
//! history lookups read from the chain tables populated by an external
//! importer, relays signed transactions to that importer, and answers bulk
//! address restore requests over a WebSocket.
//!
//! ## Modules
//!
//! - `api` - HTTP and WebSocket handlers (Axum)
//! - `auth` - API key caller identification
//! - `storage` - PostgreSQL gateway and in-memory tables
//! - `relay` - Importer client for signed transactions
//! - `health_monitor` - Database sync monitor and response guard
//! - `throttle` - Per-caller rate limiting

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health_monitor;
pub mod models;
pub mod relay;
pub mod state;
pub mod storage;
pub mod throttle;
pub mod validation;
