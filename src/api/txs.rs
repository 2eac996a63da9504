// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde_json::Value;
use tracing::debug;

use super::ApiJson;
use crate::{
    error::ApiError,
    models::{
        AddressesRequest, SignedTxRequest, TransactionRecord, TxHistoryRequest, UtxoRecord,
        UtxoSumResponse,
    },
    relay::relay_signed_tx,
    state::AppState,
    storage::HistoryQuery,
    validation::{validate_addresses, validate_date_from, validate_signed_tx},
};

#[utoipa::path(
    post,
    path = "/api/v2/txs/utxoForAddresses",
    request_body = AddressesRequest,
    tag = "Transactions",
    responses(
        (status = 200, description = "Unspent outputs of the addresses", body = [UtxoRecord]),
        (status = 400, description = "Address list empty or over the limit")
    )
)]
pub async fn utxo_for_addresses(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AddressesRequest>,
) -> Result<Json<Vec<UtxoRecord>>, ApiError> {
    debug!("[utxoForAddresses] request start");
    let addresses = validate_addresses(
        request.addresses.as_deref(),
        state.config.addresses_request_limit,
    )?;

    let utxos = state.repo.utxo_for_addresses(addresses).await?;
    debug!(count = utxos.len(), "[utxoForAddresses] result calculated");
    Ok(Json(utxos))
}

#[utoipa::path(
    post,
    path = "/api/v2/txs/utxoSumForAddresses",
    request_body = AddressesRequest,
    tag = "Transactions",
    responses(
        (status = 200, description = "Sum of unspent amounts", body = UtxoSumResponse),
        (status = 400, description = "Address list empty or over the limit")
    )
)]
pub async fn utxo_sum_for_addresses(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AddressesRequest>,
) -> Result<Json<UtxoSumResponse>, ApiError> {
    debug!("[utxoSumForAddresses] request start");
    let addresses = validate_addresses(
        request.addresses.as_deref(),
        state.config.addresses_request_limit,
    )?;

    let sum = state.repo.utxo_sum_for_addresses(addresses).await?;
    debug!(%sum, "[utxoSumForAddresses] result calculated");
    Ok(Json(UtxoSumResponse { sum }))
}

/// One page of history, ordered by `(last_update, hash)`.
///
/// To fetch the next page send the `last_update` and `hash` of the last
/// row received as `dateFrom` and `txHash`.
#[utoipa::path(
    post,
    path = "/api/v2/txs/history",
    request_body = TxHistoryRequest,
    tag = "Transactions",
    responses(
        (status = 200, description = "Transactions touching the addresses", body = [TransactionRecord]),
        (status = 400, description = "Invalid addresses or dateFrom")
    )
)]
pub async fn history(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TxHistoryRequest>,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    debug!("[history] request start");
    let addresses = validate_addresses(
        request.addresses.as_deref(),
        state.config.addresses_request_limit,
    )?;
    let date_from = validate_date_from(request.date_from.as_deref())?;
    let cursor = request.tx_hash.as_deref().filter(|hash| !hash.is_empty());

    let txs = state
        .repo
        .transactions_history(HistoryQuery {
            addresses,
            date_from,
            cursor,
            limit: state.config.tx_history_response_limit,
        })
        .await?;
    debug!(count = txs.len(), "[history] result calculated");
    Ok(Json(txs))
}

#[utoipa::path(
    post,
    path = "/api/v2/txs/pending",
    request_body = AddressesRequest,
    tag = "Transactions",
    responses(
        (status = 200, description = "Unconfirmed transactions, oldest first", body = [TransactionRecord]),
        (status = 400, description = "Address list empty or over the limit")
    )
)]
pub async fn pending(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AddressesRequest>,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    debug!("[pending] request start");
    let addresses = validate_addresses(
        request.addresses.as_deref(),
        state.config.addresses_request_limit,
    )?;

    let txs = state.repo.pending_transactions(addresses).await?;
    debug!(count = txs.len(), "[pending] result calculated");
    Ok(Json(txs))
}

/// Forward a signed transaction to the importer.
#[utoipa::path(
    post,
    path = "/api/v2/txs/signed",
    request_body = SignedTxRequest,
    tag = "Transactions",
    responses(
        (status = 200, description = "Importer accepted the transaction"),
        (status = 400, description = "Missing payload, invalid witness or rejected transaction"),
        (status = 500, description = "Importer unreachable")
    )
)]
pub async fn signed(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignedTxRequest>,
) -> Result<Json<Value>, ApiError> {
    debug!("[signed] request start");
    let signed_tx = validate_signed_tx(request.signed_tx.as_deref())?;

    let result = relay_signed_tx(state.importer.as_ref(), signed_tx).await?;
    debug!("[signed] transaction relayed");
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::api::test_support::{memory_state, state_with_importer};
    use crate::models::{Address, TX_STATE_PENDING};
    use crate::relay::{stub::StubImporter, ImporterResponse, RelayError};
    use crate::storage::memory::fixtures::{at, tx, utxo};

    fn addresses(list: &[&str]) -> AddressesRequest {
        AddressesRequest {
            addresses: Some(list.iter().map(|a| Address::from(*a)).collect()),
        }
    }

    #[tokio::test]
    async fn utxo_sum_matches_listed_utxos() {
        let (state, store) = memory_state();
        store.insert_utxo(utxo("h1", 0, "A", 100)).await;
        store.insert_utxo(utxo("h1", 1, "B", 250)).await;
        store.insert_utxo(utxo("h2", 0, "C", 999)).await;

        let Json(utxos) = utxo_for_addresses(State(state.clone()), ApiJson(addresses(&["A", "B"])))
            .await
            .unwrap();
        let Json(sum) = utxo_sum_for_addresses(State(state), ApiJson(addresses(&["A", "B"])))
            .await
            .unwrap();

        let listed: Decimal = utxos.iter().map(|u| u.amount).sum();
        assert_eq!(utxos.len(), 2);
        assert_eq!(sum.sum, listed);
        assert_eq!(sum.sum, Decimal::from(350));
    }

    #[tokio::test]
    async fn utxo_sum_is_zero_for_unknown_addresses() {
        let (state, _store) = memory_state();
        let Json(sum) = utxo_sum_for_addresses(State(state), ApiJson(addresses(&["nobody"])))
            .await
            .unwrap();
        assert_eq!(sum.sum, Decimal::ZERO);
    }

    #[tokio::test]
    async fn history_requires_a_valid_date() {
        let (state, _store) = memory_state();
        let request = TxHistoryRequest {
            addresses: Some(vec!["A".into()]),
            date_from: Some("not a date".into()),
            tx_hash: None,
        };

        let err = history(State(state), ApiJson(request)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "DateFrom should be a valid datetime");
    }

    #[tokio::test]
    async fn history_pages_with_cursor() {
        let (state, store) = memory_state();
        for i in 0..25 {
            store
                .insert_transaction(tx(&format!("h{i:02}"), at(i / 2), &["A"], &["B"]))
                .await;
        }

        let first_request = TxHistoryRequest {
            addresses: Some(vec!["A".into()]),
            date_from: Some(at(0).to_rfc3339()),
            tx_hash: None,
        };
        let Json(first) = history(State(state.clone()), ApiJson(first_request))
            .await
            .unwrap();
        assert_eq!(first.len(), 20);

        let last = first.last().unwrap();
        let next_request = TxHistoryRequest {
            addresses: Some(vec!["A".into()]),
            date_from: Some(last.last_update.to_rfc3339()),
            tx_hash: Some(last.hash.clone()),
        };
        let Json(second) = history(State(state), ApiJson(next_request)).await.unwrap();

        assert_eq!(second.len(), 5);
        let mut hashes: Vec<&str> = first.iter().chain(second.iter()).map(|t| t.hash.as_str()).collect();
        hashes.dedup();
        assert_eq!(hashes.len(), 25);
    }

    #[tokio::test]
    async fn pending_lists_only_pending_transactions() {
        let (state, store) = memory_state();
        let mut pending_tx = tx("p1", at(5), &["A"], &["B"]);
        pending_tx.tx_state = TX_STATE_PENDING.to_string();
        pending_tx.block_num = None;
        store.insert_transaction(pending_tx).await;
        store.insert_transaction(tx("c1", at(1), &["A"], &["B"])).await;

        let Json(txs) = pending(State(state), ApiJson(addresses(&["A"]))).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].hash, "p1");
    }

    #[tokio::test]
    async fn signed_requires_payload() {
        let (state, _store) = memory_state();
        let err = signed(State(state), ApiJson(SignedTxRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Signed transaction missing");
    }

    #[tokio::test]
    async fn signed_relays_payload_and_returns_importer_value() {
        let importer = Arc::new(StubImporter::accepting());
        let (state, _store) = state_with_importer(importer.clone());

        let request = SignedTxRequest {
            signed_tx: Some("signedTx".into()),
        };
        let Json(value) = signed(State(state), ApiJson(request)).await.unwrap();

        assert_eq!(value, json!([]));
        assert_eq!(*importer.received.lock().unwrap(), vec!["signedTx".to_string()]);
    }

    #[tokio::test]
    async fn signed_maps_importer_failures() {
        let cases = [
            (
                Ok(ImporterResponse::Left("Error".into())),
                StatusCode::BAD_REQUEST,
                "Error processing transaction: Error",
            ),
            (
                Ok(ImporterResponse::Left("witness doesn't pass verification".into())),
                StatusCode::BAD_REQUEST,
                "Invalid witness: witness doesn't pass verification",
            ),
            (
                Err(RelayError::Transport("connection refused".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error trying to connect with importer",
            ),
        ];

        for (reply, status, message) in cases {
            let (state, _store) = state_with_importer(Arc::new(StubImporter::replying(reply)));
            let request = SignedTxRequest {
                signed_tx: Some("signedTx".into()),
            };
            let err = signed(State(state), ApiJson(request)).await.unwrap_err();
            assert_eq!(err.status, status);
            assert_eq!(err.message, message);
        }
    }
}
