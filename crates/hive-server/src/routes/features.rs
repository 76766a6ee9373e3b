//! Feature routes.
//!
//! Same workspace scoping as tasks, but mutation is strictly owner-only
//! at every call site — features carry no admin override.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hive_core::authz::{AccessReason, OwnershipOptions};
use hive_core::types::ResourceKind;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::Feature;
use crate::repository;
use crate::routes::resolve_workspace;
use crate::state::AppState;

/// Request body for creating a feature.
#[derive(Debug, Deserialize)]
pub struct CreateFeatureRequest {
    pub title: String,
}

/// Request body for updating a feature.
#[derive(Debug, Deserialize)]
pub struct UpdateFeatureRequest {
    pub title: String,
    pub status: String,
}

/// Response for feature listing.
#[derive(Debug, Serialize)]
pub struct FeatureListResponse {
    pub features: Vec<Feature>,
}

/// Build the features router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/workspaces/{workspace}/features",
            post(create_feature).get(list_features),
        )
        .route(
            "/features/{feature_id}",
            get(get_feature).put(update_feature).delete(delete_feature),
        )
}

/// `POST /v1/workspaces/{workspace}/features` — create a feature.
async fn create_feature(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
    Json(body): Json<CreateFeatureRequest>,
) -> Result<Json<Feature>, AppError> {
    let (workspace, access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    if !access.can_write {
        return Err(AppError::Forbidden(
            "write access required to create features".to_owned(),
        ));
    }

    if body.title.is_empty() || body.title.len() > 512 {
        return Err(AppError::BadRequest(
            "title must be 1-512 characters".to_owned(),
        ));
    }

    let feature =
        repository::create_feature(&state.pool, workspace.id, &body.title, identity.user_id)
            .await?;

    Ok(Json(feature))
}

/// `GET /v1/workspaces/{workspace}/features` — list features.
async fn list_features(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
) -> Result<Json<FeatureListResponse>, AppError> {
    let (workspace, _access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    let features = repository::list_features(&state.pool, workspace.id).await?;
    Ok(Json(FeatureListResponse { features }))
}

/// `GET /v1/features/{feature_id}` — get a single feature.
async fn get_feature(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(feature_id): Path<Uuid>,
) -> Result<Json<Feature>, AppError> {
    let Some(feature) = repository::get_feature(&state.pool, feature_id).await? else {
        return Err(AppError::NotFound("feature not found".to_owned()));
    };

    let access = state
        .resolver
        .validate_workspace_access(&feature.workspace_id.to_string(), identity.user_id)
        .await?;

    if !access.can_read {
        return Err(AppError::NotFound("feature not found".to_owned()));
    }

    Ok(Json(feature))
}

/// `PUT /v1/features/{feature_id}` — update a feature, owner-only.
async fn update_feature(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(feature_id): Path<Uuid>,
    Json(body): Json<UpdateFeatureRequest>,
) -> Result<Json<Feature>, AppError> {
    require_feature_owner(&state, feature_id, identity.user_id).await?;

    if body.title.is_empty() || body.title.len() > 512 {
        return Err(AppError::BadRequest(
            "title must be 1-512 characters".to_owned(),
        ));
    }

    let feature =
        repository::update_feature(&state.pool, feature_id, &body.title, &body.status).await?;

    Ok(Json(feature))
}

/// `DELETE /v1/features/{feature_id}` — soft-delete a feature, owner-only.
async fn delete_feature(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(feature_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_feature_owner(&state, feature_id, identity.user_id).await?;

    repository::soft_delete_feature(&state.pool, feature_id).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Strict per-resource ownership: deliberately no admin override.
async fn require_feature_owner(
    state: &AppState,
    feature_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    let decision = state
        .resolver
        .validate_ownership(
            ResourceKind::Feature,
            feature_id,
            user_id,
            OwnershipOptions::default(),
        )
        .await?;

    if decision.has_access {
        return Ok(());
    }

    Err(match decision.reason {
        AccessReason::NotOwner => {
            AppError::Forbidden("only the feature creator can modify it".to_owned())
        }
        _ => AppError::NotFound("feature not found".to_owned()),
    })
}
