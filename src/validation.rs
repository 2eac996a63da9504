// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request validation.
//!
//! Every check here is synchronous and runs before the first database or
//! importer call. Addresses are only counted, never parsed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::Address;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Addresses request length should be (0, {limit}]")]
    AddressesLength { limit: usize },

    #[error("DateFrom should be a valid datetime")]
    InvalidDateFrom,

    #[error("Signed transaction missing")]
    MissingSignedTx,
}

/// Offset-aware formats tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Formats without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Check that an address list is present and holds between 1 and `limit` entries.
pub fn validate_addresses(
    addresses: Option<&[Address]>,
    limit: usize,
) -> Result<&[Address], ValidationError> {
    match addresses {
        Some(list) if !list.is_empty() && list.len() <= limit => Ok(list),
        _ => Err(ValidationError::AddressesLength { limit }),
    }
}

/// Parse the lower date bound of a history request.
pub fn validate_date_from(date_from: Option<&str>) -> Result<DateTime<Utc>, ValidationError> {
    let raw = date_from
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::InvalidDateFrom)?;
    parse_datetime(raw).ok_or(ValidationError::InvalidDateFrom)
}

/// Check that a signed transaction payload was supplied.
pub fn validate_signed_tx(signed_tx: Option<&str>) -> Result<&str, ValidationError> {
    signed_tx
        .filter(|tx| !tx.is_empty())
        .ok_or(ValidationError::MissingSignedTx)
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}
