//! Linked third-party account routes.
//!
//! A member links an account (e.g. a workflow provider) by submitting an
//! OAuth access token, which is encrypted under the `accessToken` field
//! binding before it is stored. Resolving the token back out is strictly
//! owner-only and every failure mode — never linked, unparseable envelope,
//! failed tag verification — presents as the same 404.

use axum::extract::{Path, State};
use axum::routing::{delete, get, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hive_core::authz::OwnershipOptions;
use hive_core::envelope;
use hive_core::types::ResourceKind;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::Account;
use crate::repository;
use crate::routes::{credential_not_found, resolve_credential, resolve_workspace};
use crate::state::AppState;

/// Field binding for linked-account OAuth tokens.
const ACCESS_TOKEN_FIELD: &str = "accessToken";

/// Request body for linking an account.
#[derive(Debug, Deserialize)]
pub struct LinkAccountRequest {
    pub provider: String,
    pub access_token: String,
}

/// Response for a resolved access token.
#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub provider: String,
    pub access_token: String,
}

/// Build the accounts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workspaces/{workspace}/accounts", put(link_account))
        .route("/accounts/{account_id}", delete(unlink_account))
        .route("/accounts/{account_id}/token", get(resolve_token))
}

/// `PUT /v1/workspaces/{workspace}/accounts` — link an account.
///
/// Relinking replaces the stored envelope wholesale.
async fn link_account(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
    Json(body): Json<LinkAccountRequest>,
) -> Result<Json<Account>, AppError> {
    let (workspace, _access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    if body.provider.is_empty() || body.provider.len() > 64 {
        return Err(AppError::BadRequest(
            "provider must be 1-64 characters".to_owned(),
        ));
    }
    if body.access_token.is_empty() {
        return Err(AppError::BadRequest("access_token is required".to_owned()));
    }

    let sealed = state
        .cipher
        .encrypt_field(ACCESS_TOKEN_FIELD, &body.access_token)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let account = repository::upsert_account(
        &state.pool,
        workspace.id,
        identity.user_id,
        &body.provider,
        &envelope::serialize(&sealed),
    )
    .await?;

    Ok(Json(account))
}

/// `GET /v1/accounts/{account_id}/token` — resolve the stored access
/// token for use.
///
/// Owner-only; callers who are not the linking user get the same 404 as
/// callers naming an account that does not exist.
async fn resolve_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let decision = state
        .resolver
        .validate_ownership(
            ResourceKind::Account,
            account_id,
            identity.user_id,
            OwnershipOptions::default(),
        )
        .await?;

    if !decision.has_access {
        return Err(credential_not_found());
    }

    let account = repository::get_account(&state.pool, account_id)
        .await?
        .ok_or_else(credential_not_found)?;

    let access_token = resolve_credential(
        &state.cipher,
        ACCESS_TOKEN_FIELD,
        account.access_token_ciphertext.as_deref(),
        account.workspace_id,
    )?;

    Ok(Json(AccessTokenResponse {
        provider: account.provider,
        access_token,
    }))
}

/// `DELETE /v1/accounts/{account_id}` — unlink an account, owner-only.
async fn unlink_account(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let decision = state
        .resolver
        .validate_ownership(
            ResourceKind::Account,
            account_id,
            identity.user_id,
            OwnershipOptions::default(),
        )
        .await?;

    if !decision.has_access {
        return Err(AppError::NotFound("account not found".to_owned()));
    }

    repository::soft_delete_account(&state.pool, account_id).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
