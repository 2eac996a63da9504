// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Restore notification channel.
//!
//! A client sends `{"msg":"RESTORE"}` and receives every address currently
//! holding an unspent output, split into frames of at most
//! `WS_RESTORE_CHUNK_SIZE` addresses:
//!
//! ```json
//! {"msg":"RESTORE","step":0,"addresses":["Ae2...","DdzFF..."]}
//! ```
//!
//! Other messages are ignored. The socket stays open for further requests.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tracing::{debug, error};

use crate::{
    models::{InboundMessage, RestoreMessage, MSG_TYPE_RESTORE},
    state::AppState,
    storage::{StorageResult, TxRepository},
};

#[utoipa::path(
    get,
    path = "/api/v2/ws",
    tag = "Notifications",
    responses((status = 101, description = "Switching to the restore WebSocket protocol"))
)]
pub async fn restore_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    while let Some(frame) = socket.recv().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "[WS] connection error");
                break;
            }
        };
        debug!(message = %text.as_str(), "[WS::onMessage]");

        if !is_restore_request(text.as_str()) {
            continue;
        }

        let frames =
            match restore_messages(state.repo.as_ref(), state.config.ws_restore_chunk_size).await {
                Ok(frames) => frames,
                Err(e) => {
                    error!(error = %e, "[WS::onMessage] RESTORE - db query failed");
                    continue;
                }
            };

        for frame in frames {
            debug!(step = frame.step, "[WS::onMessage] RESTORE - addresses processing step");
            let payload = match serde_json::to_string(&frame) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(error = %e, "[WS::onMessage] RESTORE - failed to encode frame");
                    break;
                }
            };
            if socket.send(Message::Text(payload.into())).await.is_err() {
                return;
            }
        }
    }
}

/// Whether a text frame is a well-formed restore request.
pub fn is_restore_request(text: &str) -> bool {
    serde_json::from_str::<InboundMessage>(text)
        .map(|message| message.msg == MSG_TYPE_RESTORE)
        .unwrap_or(false)
}

/// Build the restore frames for the current unspent address set.
///
/// An empty set still yields a single frame with step 0.
pub async fn restore_messages(
    repo: &dyn TxRepository,
    chunk_size: usize,
) -> StorageResult<Vec<RestoreMessage>> {
    let addresses = repo.unspent_addresses().await?;
    debug!(count = addresses.len(), "[WS::onMessage] RESTORE - db result ready");

    if addresses.is_empty() {
        return Ok(vec![RestoreMessage {
            msg: MSG_TYPE_RESTORE.to_string(),
            step: 0,
            addresses: Vec::new(),
        }]);
    }

    Ok(addresses
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(step, chunk)| RestoreMessage {
            msg: MSG_TYPE_RESTORE.to_string(),
            step,
            addresses: chunk.to_vec(),
        })
        .collect())
}
