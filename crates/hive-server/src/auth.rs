//! API token authentication.
//!
//! Callers authenticate with `Authorization: Bearer hive_<hex>` tokens.
//! Tokens are SHA-256 hashed before storage and lookup — plaintext tokens
//! are shown once at creation and never persisted.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::repository;
use crate::state::AppState;

/// Identity of the authenticated caller, injected into request extensions.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub token_id: Uuid,
}

/// Hash a token with SHA-256 for storage/lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// Generate a new API token string.
///
/// Format: `hive_<32 hex chars>` (128 bits of randomness from UUID v4).
#[must_use]
pub fn generate_api_token() -> String {
    let id = Uuid::new_v4();
    format!("hive_{}", id.as_simple())
}

/// Extract the token prefix for display (first 12 chars).
#[must_use]
pub fn token_prefix(token: &str) -> String {
    let end = token.len().min(12);
    format!("{}...", &token[..end])
}

/// Axum middleware that authenticates API requests.
///
/// Injects [`Identity`] into request extensions on success.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] if the `Authorization` header is
/// missing, malformed, or the token is unknown or revoked.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let Some(header) = auth_header else {
        return Err(AppError::Unauthorized(
            "missing Authorization header".to_owned(),
        ));
    };

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use Bearer scheme".to_owned())
    })?;

    if !token.starts_with("hive_") {
        return Err(AppError::Unauthorized("unrecognized token format".to_owned()));
    }

    let token_hash = hash_token(token);
    let api_token = repository::lookup_api_token(&state.pool, &token_hash).await?;

    req.extensions_mut().insert(Identity {
        user_id: api_token.user_id,
        token_id: api_token.id,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_carry_the_prefix() {
        let token = generate_api_token();
        assert!(token.starts_with("hive_"));
        assert_eq!(token.len(), 5 + 32);
    }

    #[test]
    fn hash_is_deterministic_and_hex() {
        let token = "hive_0123456789abcdef0123456789abcdef";
        let h1 = hash_token(token);
        let h2 = hash_token(token);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_tokens_hash_differently() {
        assert_ne!(hash_token(&generate_api_token()), hash_token(&generate_api_token()));
    }

    #[test]
    fn prefix_truncates_for_display() {
        let prefix = token_prefix("hive_0123456789abcdef");
        assert_eq!(prefix, "hive_0123456...");
    }
}
