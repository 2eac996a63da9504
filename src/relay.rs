// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay of signed transactions to the importer service.
//!
//! The importer answers with a tagged envelope: `{"Right": <value>}` on
//! success or `{"Left": "<message>"}` on rejection. A rejection whose message
//! reports a bad witness is surfaced separately so wallets can tell a signing
//! problem from any other failure. Submissions are never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Importer messages that identify a witness (signature) failure.
const WITNESS_FAILURE_MARKERS: &[&str] = &[
    "witness doesn't pass verification",
    "signature in the witness doesn't pass validation",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid witness: {0}")]
    InvalidWitness(String),

    #[error("Error processing transaction: {0}")]
    Rejected(String),

    /// The importer could not be reached or answered with a non-2xx status.
    #[error("Error trying to connect with importer")]
    Transport(String),

    /// The importer answered 2xx with a body that is not an envelope.
    #[error("Error trying to connect with importer")]
    MalformedEnvelope(String),
}

/// Importer reply envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ImporterResponse {
    Right(Value),
    Left(String),
}

impl ImporterResponse {
    /// Resolve the envelope into the value returned to the wallet.
    pub fn into_result(self) -> Result<Value, RelayError> {
        match self {
            ImporterResponse::Right(value) => Ok(value),
            ImporterResponse::Left(message) if is_witness_failure(&message) => {
                Err(RelayError::InvalidWitness(message))
            }
            ImporterResponse::Left(message) => Err(RelayError::Rejected(message)),
        }
    }
}

fn is_witness_failure(message: &str) -> bool {
    WITNESS_FAILURE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[async_trait]
pub trait ImporterApi: Send + Sync {
    /// Forward one signed transaction and return the importer's envelope.
    async fn send_tx(&self, signed_tx: &str) -> Result<ImporterResponse, RelayError>;
}

/// Submit a signed transaction and interpret the importer's answer.
pub async fn relay_signed_tx(
    importer: &dyn ImporterApi,
    signed_tx: &str,
) -> Result<Value, RelayError> {
    let envelope = importer.send_tx(signed_tx).await?;
    let result = envelope.into_result();
    match &result {
        Ok(_) => info!("Signed transaction accepted by importer"),
        Err(e) => debug!(error = %e, "Signed transaction rejected by importer"),
    }
    result
}

/// HTTP client for the importer's signed-transaction endpoint.
#[derive(Debug, Clone)]
pub struct HttpImporter {
    endpoint: String,
    http: Client,
}

impl HttpImporter {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImporterApi for HttpImporter {
    async fn send_tx(&self, signed_tx: &str) -> Result<ImporterResponse, RelayError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "signedTx": signed_tx }))
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("POST {} failed: {e}", self.endpoint)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "POST {} returned {status}: {body}",
                self.endpoint
            )));
        }

        response.json().await.map_err(|e| {
            RelayError::MalformedEnvelope(format!("POST {} invalid envelope: {e}", self.endpoint))
        })
    }
}
