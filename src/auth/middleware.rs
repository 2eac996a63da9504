// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key middleware for Axum.
//!
//! Resolves the [`Caller`] of every request and stores it in the request
//! extensions, where the throttle and handlers can read it.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/api/v2/healthcheck", get(health::healthcheck))
//!     .layer(axum::middleware::from_fn(api_key_auth));
//! ```

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AuthError;

/// The only scheme that names a caller.
pub const SUPPORTED_SCHEME: &str = "Bearer";

/// Header consulted for anonymous callers.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Identity attached to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// API key, or `anonymous-<forwarded-for>`; `None` when neither is known.
    pub username: Option<String>,
}

impl Caller {
    /// Key used to group requests for rate limiting.
    pub fn throttle_key(&self) -> &str {
        self.username.as_deref().unwrap_or("anonymous")
    }
}

/// Resolve the caller from the request headers.
pub fn identify_caller(headers: &HeaderMap) -> Result<Caller, AuthError> {
    let mut caller = Caller {
        username: headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|address| format!("anonymous-{address}")),
    };

    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(caller);
    };
    let header = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;

    let (scheme, rest) = header
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    let credentials = rest.split(' ').next().unwrap_or_default();

    if scheme != SUPPORTED_SCHEME {
        return Ok(caller);
    }

    caller.username = Some(credentials.to_string());
    Ok(caller)
}

/// Attach the [`Caller`] to the request, or answer 400 for a malformed header.
pub async fn api_key_auth(mut request: Request, next: Next) -> Response {
    match identify_caller(request.headers()) {
        Ok(caller) => {
            tracing::debug!(caller = caller.throttle_key(), "Caller identified");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected authorization header");
            e.into_response()
        }
    }
}
