//! Shared application state for the `Hive` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers. The field cipher is an explicitly constructed value
//! passed to call sites — there is no process-wide encryption singleton,
//! so tests can run with disposable key rings.

use std::sync::Arc;

use sqlx::PgPool;

use hive_core::authz::OwnershipResolver;
use hive_core::crypto::FieldCipher;

/// Shared application state passed to all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// Field-level credential encryption service.
    pub cipher: Arc<FieldCipher>,
    /// Ownership/role authorization resolver.
    pub resolver: Arc<OwnershipResolver>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
