//! Server configuration for `Hive`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `HIVE_*` environment variables.

use std::net::SocketAddr;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Versioned field encryption keys as configured
    /// (`version:hex32[,version:hex32...]`). `None` means no keys were
    /// configured — the server falls back to an ephemeral development key.
    pub encryption_keys: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on (binds to `0.0.0.0`)
    /// - `HIVE_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8300`)
    /// - `DATABASE_URL` — PostgreSQL connection string (default: `postgres://localhost/hive`)
    /// - `HIVE_LOG_LEVEL` — log filter (default: `info`)
    /// - `HIVE_ENCRYPTION_KEYS` — comma-separated `version:hex` pairs, 64
    ///   hex chars per key; the highest version encrypts new data
    #[must_use]
    pub fn from_env() -> Self {
        // Priority: HIVE_BIND_ADDR > PORT > default 127.0.0.1:8300
        let bind_addr = if let Ok(addr) = std::env::var("HIVE_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8300)))
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(8300);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 8300))
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/hive".to_owned());

        let log_level = std::env::var("HIVE_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        let encryption_keys = std::env::var("HIVE_ENCRYPTION_KEYS").ok();

        Self {
            bind_addr,
            database_url,
            log_level,
            encryption_keys,
        }
    }
}
