//! API token and identity routes.
//!
//! Tokens are returned in plaintext exactly once, at creation. Only the
//! SHA-256 hash is stored; listings show the display prefix.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{self, Identity};
use crate::error::AppError;
use crate::models::{ApiToken, User};
use crate::repository;
use crate::state::AppState;

/// Request body for creating an API token.
#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
}

/// Response for a freshly created token — the only place the plaintext
/// token ever appears.
#[derive(Debug, Serialize)]
pub struct CreatedTokenResponse {
    pub token: String,
    pub api_token: ApiToken,
}

/// Response for token listing.
#[derive(Debug, Serialize)]
pub struct TokenListResponse {
    pub tokens: Vec<ApiToken>,
}

/// Build the tokens router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/tokens", post(create_token).get(list_tokens))
        .route("/tokens/{token_id}", axum::routing::delete(revoke_token))
}

/// `GET /v1/auth/me` — the authenticated user.
async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<User>, AppError> {
    let user = repository::get_user(&state.pool, identity.user_id).await?;
    Ok(Json(user))
}

/// `POST /v1/tokens` — create a new API token for the current user.
async fn create_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateTokenRequest>,
) -> Result<Json<CreatedTokenResponse>, AppError> {
    if body.name.is_empty() || body.name.len() > 128 {
        return Err(AppError::BadRequest(
            "name must be 1-128 characters".to_owned(),
        ));
    }

    let token = auth::generate_api_token();
    let api_token = repository::create_api_token(
        &state.pool,
        identity.user_id,
        &body.name,
        &auth::hash_token(&token),
        &auth::token_prefix(&token),
    )
    .await?;

    Ok(Json(CreatedTokenResponse { token, api_token }))
}

/// `GET /v1/tokens` — list the current user's tokens.
async fn list_tokens(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<TokenListResponse>, AppError> {
    let tokens = repository::list_api_tokens(&state.pool, identity.user_id).await?;
    Ok(Json(TokenListResponse { tokens }))
}

/// `DELETE /v1/tokens/{token_id}` — revoke one of the current user's
/// tokens.
async fn revoke_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(token_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    repository::revoke_api_token(&state.pool, identity.user_id, token_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
