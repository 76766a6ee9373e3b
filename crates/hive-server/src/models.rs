//! Server data models.
//!
//! Row types for users, API tokens, workspaces, members, tasks, and swarm
//! records. All IDs are UUIDs. Credential ciphertext columns carry the
//! envelope text produced by `hive_core::envelope` and are never
//! serialized into API responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An API token, SHA-256 hashed at rest.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub token_hash: String,
    pub token_prefix: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// A workspace (tenant).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub owner_id: Uuid,
    #[serde(skip)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A workspace member. `left_at` marks departure; a departed member is
/// authorization-equivalent to a non-member.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkspaceMember {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

/// A task within a workspace.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_by: Uuid,
    #[serde(skip)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A feature within a workspace.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Feature {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub status: String,
    pub created_by: Uuid,
    #[serde(skip)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A third-party account linked by a user within a workspace. The OAuth
/// access token is stored as envelope text, encrypted under the
/// `accessToken` field binding.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub workspace_id: Uuid,
    /// The linking user — the account's owner for authorization.
    pub user_id: Uuid,
    pub provider: String,
    #[serde(skip)]
    pub access_token_ciphertext: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A workspace's swarm record. The API key is stored as envelope text,
/// encrypted under the `swarmApiKey` field binding; it never leaves the
/// server except through the explicit resolution endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Swarm {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub api_key_ciphertext: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
