use std::time::Duration;

use amend_core::batch::DEFAULT_MAX_BATCH_SIZE;
use amend_core::engine::{EngineConfig, DEFAULT_ENTITY_CALL_TIMEOUT};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight requests to drain on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Bound on each employee read/write in seconds; `0` disables it (default: `10`).
    pub entity_store_timeout_secs: u64,
    /// Maximum employees per submission (default: `1000`).
    pub max_batch_size: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `ENTITY_STORE_TIMEOUT_SECS` | `10`                    |
    /// | `MAX_BATCH_SIZE`            | `1000`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let entity_store_timeout_secs: u64 = std::env::var("ENTITY_STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_ENTITY_CALL_TIMEOUT.as_secs().to_string())
            .parse()
            .expect("ENTITY_STORE_TIMEOUT_SECS must be a valid u64");

        let max_batch_size: usize = std::env::var("MAX_BATCH_SIZE")
            .unwrap_or_else(|_| DEFAULT_MAX_BATCH_SIZE.to_string())
            .parse()
            .expect("MAX_BATCH_SIZE must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            entity_store_timeout_secs,
            max_batch_size,
        }
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            entity_call_timeout: match self.entity_store_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_batch_size: self.max_batch_size,
        }
    }
}
