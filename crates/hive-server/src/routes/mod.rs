//! HTTP routes for the `Hive` API.
//!
//! Handlers follow one contract: obtain an authorization decision from the
//! core resolver first, and only on a positive decision touch a stored
//! credential. Endpoints that must not leak existence return the same 404
//! for "not found" and "not visible to this caller".

pub mod accounts;
pub mod features;
pub mod swarm;
pub mod tasks;
pub mod tokens;
pub mod workspaces;

use axum::Router;
use axum::middleware as axum_mw;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use hive_core::authz::WorkspaceAccess;
use hive_core::crypto::FieldCipher;
use hive_core::envelope;
use hive_core::error::CryptoError;

use crate::auth;
use crate::error::AppError;
use crate::models::Workspace;
use crate::repository;
use crate::state::AppState;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(tokens::router())
        .merge(workspaces::router())
        .merge(tasks::router())
        .merge(features::router())
        .merge(accounts::router())
        .merge(swarm::router())
        .route_layer(axum_mw::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `GET /health` — liveness probe, no auth.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// Resolve a workspace reference and the caller's access to it.
///
/// A missing workspace, a soft-deleted workspace, and a caller with no
/// live membership all present as the same 404.
pub(crate) async fn resolve_workspace(
    state: &AppState,
    slug_or_id: &str,
    user_id: Uuid,
) -> Result<(Workspace, WorkspaceAccess), AppError> {
    let access = state
        .resolver
        .validate_workspace_access(slug_or_id, user_id)
        .await?;

    if !access.has_access {
        return Err(workspace_not_found());
    }

    let workspace = repository::find_workspace_by_ref(&state.pool, slug_or_id)
        .await?
        .ok_or_else(workspace_not_found)?;

    Ok((workspace, access))
}

pub(crate) fn workspace_not_found() -> AppError {
    AppError::NotFound("workspace not found".to_owned())
}

/// Decrypt a stored credential envelope for use.
///
/// An absent envelope, an envelope that fails to parse, and one that fails
/// tag verification all yield the same "credential not found" outcome —
/// callers cannot distinguish a corrupt credential from a missing one. An
/// unknown key version is a configuration fault and surfaces as an
/// internal error instead; the process cannot decrypt until the key is
/// provisioned.
pub(crate) fn resolve_credential(
    cipher: &FieldCipher,
    field_name: &str,
    stored: Option<&str>,
    workspace_id: Uuid,
) -> Result<String, AppError> {
    let Some(text) = stored else {
        return Err(credential_not_found());
    };

    let parsed = match envelope::deserialize(text) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(%workspace_id, field = field_name, error = %err, "stored credential envelope failed to parse");
            return Err(credential_not_found());
        }
    };

    match cipher.decrypt_field(field_name, &parsed) {
        Ok(plaintext) => Ok(plaintext),
        Err(err @ CryptoError::UnknownKeyVersion { .. }) => {
            Err(AppError::Internal(err.to_string()))
        }
        Err(err) => {
            tracing::warn!(%workspace_id, field = field_name, error = %err, "stored credential failed to decrypt");
            Err(credential_not_found())
        }
    }
}

pub(crate) fn credential_not_found() -> AppError {
    AppError::NotFound("credential not found".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hive_core::crypto::{FieldKey, KeyRing};

    fn cipher() -> FieldCipher {
        FieldCipher::new(KeyRing::single(FieldKey::generate()))
    }

    #[test]
    fn absent_credential_is_not_found() {
        let result = resolve_credential(&cipher(), "swarmApiKey", None, Uuid::new_v4());
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn garbage_envelope_degrades_to_not_found() {
        let result = resolve_credential(
            &cipher(),
            "swarmApiKey",
            Some("{definitely not an envelope"),
            Uuid::new_v4(),
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn wrong_key_envelope_degrades_to_not_found() {
        let other = cipher();
        let stored = envelope::serialize(&other.encrypt_field("swarmApiKey", "sk_live").unwrap());

        let result = resolve_credential(&cipher(), "swarmApiKey", Some(&stored), Uuid::new_v4());
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn unknown_key_version_is_an_internal_error() {
        let c = cipher();
        let mut env = c.encrypt_field("swarmApiKey", "sk_live").unwrap();
        env.key_version = 99;
        let stored = envelope::serialize(&env);

        let result = resolve_credential(&c, "swarmApiKey", Some(&stored), Uuid::new_v4());
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn valid_credential_resolves() {
        let c = cipher();
        let stored = envelope::serialize(&c.encrypt_field("swarmApiKey", "sk_live_123").unwrap());

        let value =
            resolve_credential(&c, "swarmApiKey", Some(&stored), Uuid::new_v4()).unwrap();
        assert_eq!(value, "sk_live_123");
    }
}
