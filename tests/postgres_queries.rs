// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Query gateway checks against a live PostgreSQL.
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.
//! The tables are created as temporary tables on a single pooled
//! connection, so nothing persists after the test.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use cardano_history_api::config::DbConfig;
use cardano_history_api::models::Address;
use cardano_history_api::storage::{postgres, HistoryQuery, PgRepository, TxRepository};

const SCHEMA: &[&str] = &[
    "CREATE TEMP TABLE txs (
        hash TEXT PRIMARY KEY,
        inputs_address TEXT[] NOT NULL,
        inputs_amount BIGINT[] NOT NULL,
        outputs_address TEXT[] NOT NULL,
        outputs_amount BIGINT[] NOT NULL,
        block_num BIGINT,
        time TIMESTAMPTZ,
        tx_state TEXT NOT NULL,
        last_update TIMESTAMPTZ NOT NULL
    )",
    "CREATE TEMP TABLE tx_addresses (tx_hash TEXT NOT NULL, address TEXT NOT NULL)",
    "CREATE TEMP TABLE utxos (
        utxo_id TEXT PRIMARY KEY,
        tx_hash TEXT NOT NULL,
        tx_index INTEGER NOT NULL,
        receiver TEXT NOT NULL,
        amount BIGINT NOT NULL
    )",
    "CREATE TEMP TABLE bestblock (best_block_num BIGINT NOT NULL)",
];

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_531_500_000 + secs, 0).unwrap()
}

async fn setup() -> Option<(PgRepository, PgPool)> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = postgres::connect(&DbConfig {
        url,
        min_connections: 1,
        max_connections: 1,
        idle_timeout_ms: 60_000,
        connect_timeout_ms: 5_000,
    })
    .await
    .expect("connect to TEST_DATABASE_URL");

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    Some((PgRepository::new(pool.clone()), pool))
}

async fn insert_tx(
    pool: &PgPool,
    hash: &str,
    last_update: DateTime<Utc>,
    state: &str,
    inputs: &[&str],
    outputs: &[&str],
) {
    sqlx::query("INSERT INTO txs VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
        .bind(hash)
        .bind(inputs)
        .bind(vec![10i64; inputs.len()])
        .bind(outputs)
        .bind(vec![5i64; outputs.len()])
        .bind(Some(116_147i64))
        .bind(Some(last_update))
        .bind(state)
        .bind(last_update)
        .execute(pool)
        .await
        .unwrap();

    for address in inputs.iter().chain(outputs.iter()) {
        sqlx::query("INSERT INTO tx_addresses VALUES ($1, $2)")
            .bind(hash)
            .bind(*address)
            .execute(pool)
            .await
            .unwrap();
    }
}

async fn insert_utxo(pool: &PgPool, tx_hash: &str, tx_index: i32, receiver: &str, amount: i64) {
    sqlx::query("INSERT INTO utxos VALUES ($1, $2, $3, $4, $5)")
        .bind(format!("{tx_hash}{tx_index}"))
        .bind(tx_hash)
        .bind(tx_index)
        .bind(receiver)
        .bind(amount)
        .execute(pool)
        .await
        .unwrap();
}

fn addrs(list: &[&str]) -> Vec<Address> {
    list.iter().map(|a| Address::from(*a)).collect()
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn history_is_unique_ordered_and_paginates_without_gaps() {
    let Some((repo, pool)) = setup().await else {
        return;
    };
    for i in 0..25 {
        insert_tx(&pool, &format!("h{i:02}"), at(i / 3), "Successful", &["A", "B"], &["A"]).await;
    }
    sqlx::query("INSERT INTO bestblock VALUES (116200)")
        .execute(&pool)
        .await
        .unwrap();

    let addresses = addrs(&["A", "B"]);
    let mut seen = Vec::new();
    let mut date_from = at(0);
    let mut cursor: Option<String> = None;
    loop {
        let page = repo
            .transactions_history(HistoryQuery {
                addresses: &addresses,
                date_from,
                cursor: cursor.as_deref(),
                limit: 10,
            })
            .await
            .unwrap();
        let Some(last) = page.last() else {
            break;
        };
        date_from = last.last_update;
        cursor = Some(last.hash.clone());
        assert_eq!(last.best_block_num.as_deref(), Some("116200"));
        seen.extend(page.into_iter().map(|tx| (tx.last_update, tx.hash)));
    }

    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(seen, sorted);
    assert_eq!(seen.len(), 25);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn utxo_sum_matches_listed_amounts_and_best_block_reads() {
    let Some((repo, pool)) = setup().await else {
        return;
    };
    insert_utxo(&pool, "h1", 0, "A", 1_000_000).await;
    insert_utxo(&pool, "h1", 1, "B", 42).await;
    insert_utxo(&pool, "h2", 0, "C", 7).await;

    let addresses = addrs(&["A", "B", "A"]);
    let utxos = repo.utxo_for_addresses(&addresses).await.unwrap();
    let sum = repo.utxo_sum_for_addresses(&addresses).await.unwrap();

    assert_eq!(utxos.len(), 2);
    assert_eq!(sum, utxos.iter().map(|u| u.amount).sum::<Decimal>());
    assert_eq!(
        repo.utxo_sum_for_addresses(&addrs(&["nobody"])).await.unwrap(),
        Decimal::ZERO
    );

    assert_eq!(repo.best_block().await.unwrap(), None);
    sqlx::query("INSERT INTO bestblock VALUES (7)")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(repo.best_block().await.unwrap(), Some(7));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn filter_used_and_pending_follow_the_usage_index() {
    let Some((repo, pool)) = setup().await else {
        return;
    };
    insert_tx(&pool, "c1", at(1), "Successful", &["A"], &["B"]).await;
    insert_tx(&pool, "p2", at(9), "Pending", &["A"], &["C"]).await;
    insert_tx(&pool, "p1", at(4), "Pending", &["D"], &["A"]).await;

    let mut used = repo
        .filter_used_addresses(&addrs(&["A", "B", "Z", "A"]))
        .await
        .unwrap();
    used.sort();
    assert_eq!(used, addrs(&["A", "B"]));

    let pending = repo.pending_transactions(&addrs(&["A"])).await.unwrap();
    let hashes: Vec<&str> = pending.iter().map(|tx| tx.hash.as_str()).collect();
    assert_eq!(hashes, vec!["p1", "p2"]);
}
