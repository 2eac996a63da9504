// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::{ApiConfig, ThrottleConfig};
use crate::health_monitor::HealthState;
use crate::relay::ImporterApi;
use crate::storage::TxRepository;
use crate::throttle::Throttle;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn TxRepository>,
    pub importer: Arc<dyn ImporterApi>,
    pub config: Arc<ApiConfig>,
    pub health: Arc<HealthState>,
    pub throttle: Arc<Throttle>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn TxRepository>,
        importer: Arc<dyn ImporterApi>,
        config: ApiConfig,
        throttle: ThrottleConfig,
    ) -> Self {
        Self {
            repo,
            importer,
            config: Arc::new(config),
            health: Arc::new(HealthState::default()),
            throttle: Arc::new(Throttle::new(throttle)),
        }
    }
}
