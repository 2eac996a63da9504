// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use tracing::debug;

use super::ApiJson;
use crate::{
    error::ApiError,
    models::{Address, AddressesRequest},
    state::AppState,
    validation::validate_addresses,
};

/// Return the subset of addresses that appear in at least one transaction.
#[utoipa::path(
    post,
    path = "/api/v2/addresses/filterUsed",
    request_body = AddressesRequest,
    tag = "Addresses",
    responses(
        (status = 200, description = "Used addresses, each at most once", body = [Address]),
        (status = 400, description = "Address list empty or over the limit")
    )
)]
pub async fn filter_used(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AddressesRequest>,
) -> Result<Json<Vec<Address>>, ApiError> {
    debug!("[filterUsed] request start");
    let addresses = validate_addresses(
        request.addresses.as_deref(),
        state.config.addresses_request_limit,
    )?;

    let used = state.repo.filter_used_addresses(addresses).await?;
    debug!(count = used.len(), "[filterUsed] result calculated");
    Ok(Json(used))
}
