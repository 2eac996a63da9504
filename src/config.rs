// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment at startup (a `.env` file is
//! loaded first when present). `APP_ENV` selects a profile of defaults and
//! every variable below overrides its profile value.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ENV` | Profile: `development`, `test` or `production` | `development` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `STORAGE_MODE` | `postgres` or `memory` | `postgres` (`test`: `memory`) |
//! | `DATABASE_URL` | PostgreSQL connection URL | Required for `postgres` |
//! | `MEMORY_SEED_FILE` | JSON file loaded into `memory` storage at startup | Unset (empty store) |
//! | `DB_POOL_MIN` / `DB_POOL_MAX` | Pool size bounds | `4` / `20` |
//! | `DB_IDLE_TIMEOUT_MS` | Idle connection lifetime | `1000` |
//! | `DB_CONNECT_TIMEOUT_MS` | Connection acquire timeout | `1000` |
//! | `CORS_ENABLED_FOR` | Comma-separated origins, `*` globs allowed | `*` |
//! | `CORS_ALLOW_CREDENTIALS` | Allow credentialed CORS requests | `false` |
//! | `ADDRESSES_REQUEST_LIMIT` | Max addresses per request | `50` |
//! | `TX_HISTORY_RESPONSE_LIMIT` | History page size | `20` |
//! | `MAX_BODY_BYTES` | Request body limit | `1048576` |
//! | `IMPORTER_SEND_TX_ENDPOINT` | Importer signed-tx URL | `http://localhost:8200/api/txs/signed` |
//! | `WS_RESTORE_CHUNK_SIZE` | Addresses per restore message | `10000` |
//! | `THROTTLE_BURST` | Token bucket capacity per caller | `50` |
//! | `THROTTLE_RATE` | Tokens refilled per second | `10` |
//! | `DISABLE_HEALTHCHECK` | Disable database sync monitor | `false` (`test`: `true`; always off for `memory`) |
//! | `HEALTHCHECK_INTERVAL_SECS` | Monitor period | `70` |
//! | `TLS_DIR` | Directory holding `server.crt` and `server.key` | Unset (plain HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

pub const APP_ENV_ENV: &str = "APP_ENV";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const STORAGE_MODE_ENV: &str = "STORAGE_MODE";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const MEMORY_SEED_FILE_ENV: &str = "MEMORY_SEED_FILE";
pub const DB_POOL_MIN_ENV: &str = "DB_POOL_MIN";
pub const DB_POOL_MAX_ENV: &str = "DB_POOL_MAX";
pub const DB_IDLE_TIMEOUT_MS_ENV: &str = "DB_IDLE_TIMEOUT_MS";
pub const DB_CONNECT_TIMEOUT_MS_ENV: &str = "DB_CONNECT_TIMEOUT_MS";
pub const CORS_ENABLED_FOR_ENV: &str = "CORS_ENABLED_FOR";
pub const CORS_ALLOW_CREDENTIALS_ENV: &str = "CORS_ALLOW_CREDENTIALS";
pub const ADDRESSES_REQUEST_LIMIT_ENV: &str = "ADDRESSES_REQUEST_LIMIT";
pub const TX_HISTORY_RESPONSE_LIMIT_ENV: &str = "TX_HISTORY_RESPONSE_LIMIT";
pub const MAX_BODY_BYTES_ENV: &str = "MAX_BODY_BYTES";
pub const IMPORTER_SEND_TX_ENDPOINT_ENV: &str = "IMPORTER_SEND_TX_ENDPOINT";
pub const WS_RESTORE_CHUNK_SIZE_ENV: &str = "WS_RESTORE_CHUNK_SIZE";
pub const THROTTLE_BURST_ENV: &str = "THROTTLE_BURST";
pub const THROTTLE_RATE_ENV: &str = "THROTTLE_RATE";
pub const DISABLE_HEALTHCHECK_ENV: &str = "DISABLE_HEALTHCHECK";
pub const HEALTHCHECK_INTERVAL_SECS_ENV: &str = "HEALTHCHECK_INTERVAL_SECS";

/// Directory containing `server.crt` and `server.key` (PEM).
///
/// When set the server only accepts HTTPS.
pub const TLS_DIR_ENV: &str = "TLS_DIR";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_IMPORTER_SEND_TX_ENDPOINT: &str = "http://localhost:8200/api/txs/signed";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("DATABASE_URL is required when STORAGE_MODE=postgres")]
    MissingDatabaseUrl,
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl Display) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Deployment profile selected by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            _ => Err("expected development, test or production".to_string()),
        }
    }
}

impl Environment {
    fn default_storage_mode(self) -> StorageMode {
        match self {
            Environment::Test => StorageMode::Memory,
            Environment::Development | Environment::Production => StorageMode::Postgres,
        }
    }

    fn healthcheck_disabled_by_default(self) -> bool {
        matches!(self, Environment::Test)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Postgres,
    Memory,
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "in_memory" | "inmemory" => Ok(Self::Memory),
            _ => Err("expected postgres or memory".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub idle_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Exact origins, `*`, or patterns such as `https://*.example.com`.
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub burst: u32,
    pub rate_per_sec: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthcheckConfig {
    pub enabled: bool,
    pub interval: Duration,
}

/// Limits and endpoints consulted by request handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub addresses_request_limit: usize,
    pub tx_history_response_limit: usize,
    pub ws_restore_chunk_size: usize,
    pub importer_send_tx_endpoint: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addresses_request_limit: 50,
            tx_history_response_limit: 20,
            ws_restore_chunk_size: 10_000,
            importer_send_tx_endpoint: DEFAULT_IMPORTER_SEND_TX_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub storage_mode: StorageMode,
    /// Present whenever `DATABASE_URL` is set; required for `postgres` mode.
    pub database: Option<DbConfig>,
    /// Rows loaded into the in-memory store; ignored for `postgres` mode.
    pub memory_seed: Option<PathBuf>,
    pub cors: CorsConfig,
    pub max_body_bytes: usize,
    pub throttle: ThrottleConfig,
    pub healthcheck: HealthcheckConfig,
    pub tls_dir: Option<PathBuf>,
    pub api: ApiConfig,
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Empty and whitespace-only values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment: Environment = parse_or(&get, APP_ENV_ENV, Environment::default())?;
        let storage_mode = parse_or(&get, STORAGE_MODE_ENV, environment.default_storage_mode())?;

        let database = match get(DATABASE_URL_ENV) {
            Some(url) => {
                let min_connections = parse_or(&get, DB_POOL_MIN_ENV, 4u32)?;
                let max_connections = positive(&get, DB_POOL_MAX_ENV, 20u32)?;
                if min_connections > max_connections {
                    return Err(ConfigError::invalid(
                        DB_POOL_MIN_ENV,
                        &min_connections.to_string(),
                        format!("must not exceed {DB_POOL_MAX_ENV} ({max_connections})"),
                    ));
                }
                Some(DbConfig {
                    url,
                    min_connections,
                    max_connections,
                    idle_timeout_ms: parse_or(&get, DB_IDLE_TIMEOUT_MS_ENV, 1000u64)?,
                    connect_timeout_ms: positive(&get, DB_CONNECT_TIMEOUT_MS_ENV, 1000u64)?,
                })
            }
            None => None,
        };
        if storage_mode == StorageMode::Postgres && database.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let allowed_origins = get(CORS_ENABLED_FOR_ENV)
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let importer_send_tx_endpoint = get(IMPORTER_SEND_TX_ENDPOINT_ENV)
            .unwrap_or_else(|| DEFAULT_IMPORTER_SEND_TX_ENDPOINT.to_string());
        url::Url::parse(&importer_send_tx_endpoint).map_err(|e| {
            ConfigError::invalid(IMPORTER_SEND_TX_ENDPOINT_ENV, &importer_send_tx_endpoint, e)
        })?;

        let healthcheck_disabled = parse_bool_or(
            &get,
            DISABLE_HEALTHCHECK_ENV,
            environment.healthcheck_disabled_by_default(),
        )?;
        // Memory storage has no advancing best block to monitor.
        let healthcheck_disabled = healthcheck_disabled || storage_mode == StorageMode::Memory;

        Ok(Self {
            environment,
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, PORT_ENV, 8080u16)?,
            storage_mode,
            database,
            memory_seed: get(MEMORY_SEED_FILE_ENV).map(PathBuf::from),
            cors: CorsConfig {
                allowed_origins,
                allow_credentials: parse_bool_or(&get, CORS_ALLOW_CREDENTIALS_ENV, false)?,
            },
            max_body_bytes: positive(&get, MAX_BODY_BYTES_ENV, 1024 * 1024usize)?,
            throttle: ThrottleConfig {
                burst: positive(&get, THROTTLE_BURST_ENV, 50u32)?,
                rate_per_sec: positive(&get, THROTTLE_RATE_ENV, 10u32)?,
            },
            healthcheck: HealthcheckConfig {
                enabled: !healthcheck_disabled,
                interval: Duration::from_secs(positive(
                    &get,
                    HEALTHCHECK_INTERVAL_SECS_ENV,
                    70u64,
                )?),
            },
            tls_dir: get(TLS_DIR_ENV).map(PathBuf::from),
            api: ApiConfig {
                addresses_request_limit: positive(&get, ADDRESSES_REQUEST_LIMIT_ENV, 50usize)?,
                tx_history_response_limit: positive(&get, TX_HISTORY_RESPONSE_LIMIT_ENV, 20usize)?,
                ws_restore_chunk_size: positive(&get, WS_RESTORE_CHUNK_SIZE_ENV, 10_000usize)?,
                importer_send_tx_endpoint,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match get(var) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::invalid(var, &raw, e)),
        None => Ok(default),
    }
}

fn positive<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Display,
    T::Err: Display,
{
    let value = parse_or(get, var, default)?;
    if value <= T::default() {
        return Err(ConfigError::invalid(var, &value.to_string(), "must be positive"));
    }
    Ok(value)
}

fn parse_bool_or<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(var, &raw, "expected a boolean")),
        },
        None => Ok(default),
    }
}
