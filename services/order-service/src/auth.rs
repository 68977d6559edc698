//! Bearer-token authentication
//!
//! Token issuance belongs to the auth collaborator; this edge only verifies
//! the bearer JWT it issued and extracts the user id from the claims. A
//! small decode cache skips repeated verification of the same token within
//! its lifetime.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dashmap::DashMap;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use types::ids::UserId;
use types::time::unix_nanos;

use crate::error::AppError;
use crate::state::AppState;

/// Claims the auth collaborator puts into its bearer tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub user_id: UserId,
}

/// Verifies bearer tokens against the shared secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    cache: DashMap<String, (UserId, usize)>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            cache: DashMap::new(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<UserId, AppError> {
        let now_secs = (unix_nanos() / 1_000_000_000) as usize;
        if let Some(cached) = self.cache.get(token) {
            let (user, exp) = *cached;
            if exp > now_secs {
                return Ok(user);
            }
            drop(cached);
            self.cache.remove(token);
        }

        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AppError::Unauthenticated(format!("invalid token: {e}")))?;
        self.cache
            .insert(token.to_string(), (data.claims.user_id, data.claims.exp));
        Ok(data.claims.user_id)
    }
}

/// Extractor for the authenticated caller.
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .ok_or_else(|| AppError::Unauthenticated("missing credentials".into()))?;
        let value = header
            .to_str()
            .map_err(|_| AppError::Unauthenticated("invalid header".into()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthenticated("expected bearer token".into()))?;

        let user_id = state.verifier.verify(token)?;
        Ok(AuthenticatedUser { user_id })
    }
}

/// Issue a token the verifier accepts. Test and development use only; real
/// issuance lives in the auth collaborator.
pub fn issue_token(secret: &str, user_id: UserId, ttl_secs: usize) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (unix_nanos() / 1_000_000_000) as usize + ttl_secs,
        user_id,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("static header and claims always encode")
}

/// Shared verifier handle.
pub type SharedVerifier = Arc<TokenVerifier>;
