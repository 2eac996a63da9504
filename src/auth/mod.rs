// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Caller Identification
//!
//! Requests are not authenticated; the API key only names the caller so that
//! throttling can be applied per client.
//!
//! ## Resolution
//!
//! 1. `Authorization: Bearer <key>` names the caller `<key>`
//! 2. Otherwise `X-Forwarded-For: <ip>` names the caller `anonymous-<ip>`
//! 3. Otherwise the caller is unnamed
//!
//! An `Authorization` header without a space separating scheme and
//! credentials is rejected with 400. Other schemes are ignored.

pub mod error;
pub mod middleware;

pub use error::AuthError;
pub use middleware::{api_key_auth, identify_caller, Caller};
