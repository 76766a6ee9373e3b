//! `Hive` server entry point.
//!
//! Bootstraps the key ring, database pool, and shared state, then starts
//! the Axum HTTP server with graceful shutdown. The field cipher and the
//! ownership resolver are constructed here and injected — there is no
//! global encryption state.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, warn};

use hive_core::authz::OwnershipResolver;
use hive_core::crypto::{FieldCipher, FieldKey, KeyRing};
use hive_server::config::ServerConfig;
use hive_server::repository::PgDirectory;
use hive_server::routes;
use hive_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!("Hive starting");

    let ring = build_key_ring(config.encryption_keys.as_deref())?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    let state = AppState {
        pool: pool.clone(),
        cipher: Arc::new(FieldCipher::new(ring)),
        resolver: Arc::new(OwnershipResolver::new(PgDirectory::shared(pool))),
    };

    let app = routes::build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Hive server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Hive server stopped");
    Ok(())
}

/// Parse `version:hex` key entries into a key ring.
///
/// With no configured keys the server runs on an ephemeral random key —
/// fine for development, but nothing encrypted survives a restart.
fn build_key_ring(configured: Option<&str>) -> anyhow::Result<KeyRing> {
    let Some(configured) = configured else {
        warn!("HIVE_ENCRYPTION_KEYS is not set — using an ephemeral key; encrypted data will not survive a restart");
        return Ok(KeyRing::single(FieldKey::generate()));
    };

    let mut keys = BTreeMap::new();
    for entry in configured.split(',') {
        let (version, material) = entry
            .split_once(':')
            .with_context(|| format!("invalid key entry '{entry}', expected 'version:hex'"))?;
        let version: u32 = version
            .trim()
            .parse()
            .with_context(|| format!("invalid key version '{version}'"))?;
        let key = FieldKey::from_hex(material.trim())
            .with_context(|| format!("invalid key material for version {version}"))?;
        keys.insert(version, key);
    }

    Ok(KeyRing::new(keys)?)
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_ring_parses_versioned_entries() {
        let k1 = hex::encode([0x11u8; 32]);
        let k2 = hex::encode([0x22u8; 32]);
        let ring = build_key_ring(Some(&format!("1:{k1},2:{k2}"))).unwrap();
        assert_eq!(ring.current_version(), 2);
    }

    #[test]
    fn key_ring_rejects_bad_entries() {
        assert!(build_key_ring(Some("nope")).is_err());
        assert!(build_key_ring(Some("x:abcd")).is_err());
        assert!(build_key_ring(Some("1:not-hex")).is_err());
        assert!(build_key_ring(Some("1:abcd")).is_err());
    }

    #[test]
    fn missing_config_falls_back_to_ephemeral_key() {
        let ring = build_key_ring(None).unwrap();
        assert_eq!(ring.current_version(), 1);
    }
}
