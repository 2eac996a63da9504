// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{DefaultBodyLimit, FromRequest},
    http::{header, request::Parts, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::api_key_auth,
    config::{CorsConfig, ServerConfig},
    error::ApiError,
    health_monitor::response_guard,
    models::{
        Address, AddressesRequest, HealthcheckResponse, SignedTxRequest, TransactionRecord,
        TxHistoryRequest, UtxoRecord, UtxoSumResponse,
    },
    state::AppState,
    throttle::throttle_requests,
};

pub mod addresses;
pub mod health;
pub mod txs;
pub mod ws;

/// JSON body extractor whose rejections use the API error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let v2_routes = Router::new()
        .route("/healthcheck", get(health::healthcheck))
        .route("/addresses/filterUsed", post(addresses::filter_used))
        .route("/txs/utxoForAddresses", post(txs::utxo_for_addresses))
        .route("/txs/utxoSumForAddresses", post(txs::utxo_sum_for_addresses))
        .route("/txs/history", post(txs::history))
        .route("/txs/pending", post(txs::pending))
        .route("/txs/signed", post(txs::signed))
        .route("/ws", get(ws::restore_socket))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v2", v2_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), throttle_requests))
        .layer(middleware::from_fn_with_state(state, response_guard))
        .layer(middleware::from_fn(api_key_auth))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// Build the CORS layer from the configured origin patterns.
///
/// Credentialed CORS forbids wildcard responses, so with credentials enabled
/// the request origin and headers are echoed back when allowed.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let patterns = config.allowed_origins.clone();
    let allow_any = patterns.iter().any(|p| p == "*");

    if config.allow_credentials {
        return CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _: &Parts| origin_allowed(&patterns, origin),
            ));
    }

    let layer = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    if allow_any {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &Parts| origin_allowed(&patterns, origin),
        ))
    }
}

/// Match an origin against exact values, `*`, or single-`*` glob patterns.
pub fn origin_allowed(patterns: &[String], origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    patterns.iter().any(|pattern| match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() >= prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
        }
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck,
        addresses::filter_used,
        txs::utxo_for_addresses,
        txs::utxo_sum_for_addresses,
        txs::history,
        txs::pending,
        txs::signed,
        ws::restore_socket
    ),
    components(
        schemas(
            Address,
            UtxoRecord,
            TransactionRecord,
            AddressesRequest,
            TxHistoryRequest,
            SignedTxRequest,
            UtxoSumResponse,
            HealthcheckResponse
        )
    ),
    tags(
        (name = "Health", description = "Service liveness"),
        (name = "Addresses", description = "Address usage lookups"),
        (name = "Transactions", description = "UTXOs, history and signed transaction relay"),
        (name = "Notifications", description = "WebSocket restore channel")
    )
)]
struct ApiDoc;


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::test_support::{state_for, test_config};
    use super::*;
    use crate::relay::stub::StubImporter;
    use crate::storage::memory::fixtures::{at, tx, utxo};

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app(overrides: &[(&str, &str)]) -> (Router, AppState, Arc<crate::storage::InMemoryStore>) {
        let config = test_config(overrides);
        let (state, store) = state_for(&config, Arc::new(StubImporter::accepting()));
        (router(state.clone(), &config), state, store)
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (app, _, _) = app(&[]);
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn healthcheck_returns_version_and_request_id() {
        let (app, _, _) = app(&[]);
        let request = Request::builder()
            .uri("/api/v2/healthcheck")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(
            body_json(response).await,
            json!({ "version": env!("CARGO_PKG_VERSION") })
        );
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (app, _, _) = app(&[]);
        let request = Request::builder()
            .uri("/api/v2/nope")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error_code"], "not_found");
    }

    #[tokio::test]
    async fn empty_address_list_is_400_with_limit_message() {
        let (app, _, _) = app(&[]);
        let response = app
            .oneshot(post_json("/api/v2/addresses/filterUsed", json!({ "addresses": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Addresses request length should be (0, 50]"
        );
    }

    #[tokio::test]
    async fn over_limit_address_list_is_400() {
        let (app, _, _) = app(&[("ADDRESSES_REQUEST_LIMIT", "2")]);
        let response = app
            .oneshot(post_json(
                "/api/v2/txs/utxoForAddresses",
                json!({ "addresses": ["a", "b", "c"] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Addresses request length should be (0, 2]"
        );
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let (app, _, _) = app(&[]);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v2/txs/pending")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "validation_error");
    }

    #[tokio::test]
    async fn utxo_sum_serialises_amount_as_string() {
        let (app, _, store) = app(&[]);
        store.insert_utxo(utxo("h1", 0, "A", 1_000_000)).await;
        store.insert_utxo(utxo("h2", 3, "A", 500)).await;

        let response = app
            .oneshot(post_json(
                "/api/v2/txs/utxoSumForAddresses",
                json!({ "addresses": ["A"] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "sum": "1000500" }));
    }

    #[tokio::test]
    async fn history_accepts_camel_case_fields() {
        let (app, _, store) = app(&[]);
        store.insert_transaction(tx("h1", at(10), &["A"], &["B"])).await;
        store.set_best_block(116_200).await;

        let response = app
            .oneshot(post_json(
                "/api/v2/txs/history",
                json!({ "addresses": ["B"], "dateFrom": at(0).to_rfc3339() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["hash"], "h1");
        assert_eq!(body[0]["best_block_num"], "116200");
        assert_eq!(body[0]["inputs_amount"], json!(["10"]));
    }

    #[tokio::test]
    async fn signed_tx_right_envelope_is_200() {
        let (app, _, _) = app(&[]);
        let response = app
            .oneshot(post_json("/api/v2/txs/signed", json!({ "signedTx": "abc" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn invalid_authorization_header_is_400() {
        let (app, _, _) = app(&[]);
        let request = Request::builder()
            .uri("/api/v2/healthcheck")
            .header(header::AUTHORIZATION, "invalid-authorization")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Authorization header content is invalid."
        );
    }

    #[tokio::test]
    async fn exhausted_bucket_is_429() {
        let (app, _, _) = app(&[("THROTTLE_BURST", "2"), ("THROTTLE_RATE", "1")]);
        let request = || {
            Request::builder()
                .uri("/api/v2/healthcheck")
                .header(header::AUTHORIZATION, "Bearer key")
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        let response = app.oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await["error"],
            "You have exceeded your request rate"
        );
    }

    #[tokio::test]
    async fn unhealthy_database_is_503() {
        let (app, state, _) = app(&[]);
        state.health.set_healthy(false);

        let request = Request::builder()
            .uri("/api/v2/healthcheck")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_json(response).await["error"],
            "The database is not synchronised with the blockchain."
        );
    }

    #[tokio::test]
    async fn cors_allows_listed_origin() {
        let (app, _, _) = app(&[("CORS_ENABLED_FOR", "https://*.example.com")]);
        let request = Request::builder()
            .uri("/api/v2/healthcheck")
            .header(header::ORIGIN, "https://wallet.example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://wallet.example.com"
        );
    }

    #[test]
    fn origin_patterns_match_exact_wildcard_and_glob() {
        let patterns = vec![
            "https://exact.io".to_string(),
            "https://*.example.com".to_string(),
        ];
        let allowed = |origin: &'static str| {
            origin_allowed(&patterns, &HeaderValue::from_static(origin))
        };

        assert!(allowed("https://exact.io"));
        assert!(allowed("https://a.example.com"));
        assert!(!allowed("https://example.org"));
        assert!(!allowed("http://a.example.com"));
        assert!(origin_allowed(
            &["*".to_string()],
            &HeaderValue::from_static("https://anything.io")
        ));
    }
}
