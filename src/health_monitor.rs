// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Database Sync Monitor
//!
//! Background task that samples the importer's best block and flags the
//! database as unhealthy when it stops moving. While the flag is down the
//! [`response_guard`] middleware answers every request with 503.
//!
//! ## Strategy
//!
//! Every `interval` (default 70 s) the monitor reads `bestblock`. The
//! database is up to date when a best block exists and differs from the
//! previous sample. A failed read counts as out of date. Only transitions
//! are logged.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::TxRepository;

pub const UNSYNCHRONISED_MESSAGE: &str = "The database is not synchronised with the blockchain.";

/// Shared database health flag; healthy until the monitor says otherwise.
#[derive(Debug)]
pub struct HealthState {
    healthy: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            healthy: AtomicBool::new(true),
        }
    }
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Store the new flag and return the previous one.
    pub fn set_healthy(&self, healthy: bool) -> bool {
        self.healthy.swap(healthy, Ordering::AcqRel)
    }
}

pub struct HealthMonitor {
    repo: Arc<dyn TxRepository>,
    health: Arc<HealthState>,
    interval: Duration,
    previous_best_block: Option<i64>,
}

impl HealthMonitor {
    pub fn new(repo: Arc<dyn TxRepository>, health: Arc<HealthState>, interval: Duration) -> Self {
        Self {
            repo,
            health,
            interval,
            previous_best_block: None,
        }
    }

    /// Run the monitor loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(monitor.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Database sync monitor starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Database sync monitor shutting down");
                return;
            }

            self.sample().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Database sync monitor shutting down");
                    return;
                }
            }
        }
    }

    /// Read the best block once and update the health flag.
    async fn sample(&mut self) -> bool {
        let current = match self.repo.best_block().await {
            Ok(block) => block,
            Err(e) => {
                warn!(error = %e, "Database sync monitor: failed to read best block");
                None
            }
        };

        let up_to_date = current.is_some() && current != self.previous_best_block;
        let was_healthy = self.health.set_healthy(up_to_date);
        if was_healthy != up_to_date {
            if up_to_date {
                info!(best_block = ?current, "Database is updating again.");
            } else {
                info!(best_block = ?current, "Database did not update!");
            }
        }

        self.previous_best_block = current;
        up_to_date
    }
}

/// Answer 503 while the database is flagged as out of sync.
pub async fn response_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.health.is_healthy() {
        next.run(request).await
    } else {
        ApiError::unavailable(UNSYNCHRONISED_MESSAGE).into_response()
    }
}
