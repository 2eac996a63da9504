// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;

use crate::models::HealthcheckResponse;

/// Liveness probe reporting the running service version.
///
/// Database health is not checked here; while the database is out of sync
/// the response guard answers 503 before this handler runs.
#[utoipa::path(
    get,
    path = "/api/v2/healthcheck",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthcheckResponse),
        (status = 503, description = "Database is not synchronised")
    )
)]
pub async fn healthcheck() -> Json<HealthcheckResponse> {
    Json(HealthcheckResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
