// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardano_history_api::{
    api::router,
    config::{ServerConfig, StorageMode, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    health_monitor::HealthMonitor,
    relay::HttpImporter,
    state::AppState,
    storage::{postgres, InMemoryStore, PgRepository, TxRepository},
};

/// Time allowed for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

const TLS_CERT_FILE: &str = "server.crt";
const TLS_KEY_FILE: &str = "server.key";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let json = env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration error");
            std::process::exit(1);
        }
    };
    info!(
        environment = ?config.environment,
        storage_mode = ?config.storage_mode,
        healthcheck = config.healthcheck.enabled,
        "Configuration loaded"
    );

    let (repo, pool): (Arc<dyn TxRepository>, _) = match (config.storage_mode, &config.database) {
        (StorageMode::Postgres, Some(db)) => match postgres::connect(db).await {
            Ok(pool) => {
                info!(max_connections = db.max_connections, "Connected to PostgreSQL");
                let repo: Arc<dyn TxRepository> = Arc::new(PgRepository::new(pool.clone()));
                (repo, Some(pool))
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to PostgreSQL");
                std::process::exit(1);
            }
        },
        (StorageMode::Postgres, None) => {
            error!("DATABASE_URL is required when STORAGE_MODE=postgres");
            std::process::exit(1);
        }
        (StorageMode::Memory, _) => {
            let store = match &config.memory_seed {
                Some(path) => match InMemoryStore::load_seed(path).await {
                    Ok(store) => {
                        info!(seed = %path.display(), "Loaded in-memory chain tables");
                        store
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to load memory seed");
                        std::process::exit(1);
                    }
                },
                None => {
                    warn!("In-memory storage without MEMORY_SEED_FILE; every query returns empty results");
                    InMemoryStore::new()
                }
            };
            let repo: Arc<dyn TxRepository> = Arc::new(store);
            (repo, None)
        }
    };

    let importer = match HttpImporter::new(config.api.importer_send_tx_endpoint.clone()) {
        Ok(importer) => importer,
        Err(e) => {
            error!(error = %e, "Failed to build importer client");
            std::process::exit(1);
        }
    };
    info!(endpoint = importer.endpoint(), "Importer relay configured");

    let state = AppState::new(
        repo.clone(),
        Arc::new(importer),
        config.api.clone(),
        config.throttle,
    );

    let shutdown = CancellationToken::new();
    let monitor = if config.healthcheck.enabled {
        let monitor = HealthMonitor::new(repo, state.health.clone(), config.healthcheck.interval);
        Some(tokio::spawn(monitor.run(shutdown.clone())))
    } else {
        info!("Database sync monitor disabled");
        None
    };

    let app = router(state, &config);

    let addr: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, address = %config.bind_address(), "Invalid bind address");
            std::process::exit(1);
        }
    };

    let handle = Handle::new();
    {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        });
    }

    let served = match &config.tls_dir {
        Some(dir) => {
            let cert = dir.join(TLS_CERT_FILE);
            let key = dir.join(TLS_KEY_FILE);
            let tls = match RustlsConfig::from_pem_file(cert, key).await {
                Ok(tls) => tls,
                Err(e) => {
                    error!(error = %e, dir = %dir.display(), "Failed to load TLS certificate");
                    std::process::exit(1);
                }
            };
            info!("Cardano history API listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!("Cardano history API listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };
    if let Err(e) = served {
        error!(error = %e, "Server failed");
    }

    shutdown.cancel();
    if let Some(monitor) = monitor {
        let _ = monitor.await;
    }
    if let Some(pool) = pool {
        pool.close().await;
        info!("Database pool closed");
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
