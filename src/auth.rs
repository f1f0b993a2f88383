use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::handlers::{AppError, AppState};
use crate::store::{User, UserId};

pub const TOKEN_PREFIX: &str = "planner_sk_";

/// Generate an API token. Returns `(full_token, sha256_hash)`.
/// Only the hash is ever stored.
pub fn generate_token() -> (String, String) {
    let token = format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple());
    let hash = hash_token(&token);
    (token, hash)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// The caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub username: String,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Authorization header must use Bearer scheme".to_string())
        })?;

        if !token.starts_with(TOKEN_PREFIX) {
            return Err(AppError::Unauthorized("Invalid token format".to_string()));
        }

        let user = state
            .store
            .find_user_by_token_hash(&hash_token(token))?
            .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;
        Ok(user.into())
    }
}
