//! Shared-password login and the session gate for mutating endpoints.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::routes::{AppError, AppState};

/// Issued session tokens. Tokens never expire and are never removed.
pub struct Sessions {
    username: String,
    password: String,
    tokens: RwLock<HashSet<String>>,
}

impl Sessions {
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password,
            tokens: RwLock::new(HashSet::new()),
        }
    }

    /// Check the shared credentials and mint a token on a match.
    pub async fn login(&self, username: &str, password: &str) -> Option<String> {
        if username != self.username || password != self.password {
            warn!("Rejected login for '{}'", username);
            return None;
        }

        let token = hex::encode(rand::random::<[u8; 16]>());
        self.tokens.write().await.insert(token.clone());
        Some(token)
    }

    pub async fn is_valid(&self, token: &str) -> bool {
        self.tokens.read().await.contains(token)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

/// Extractor that only succeeds for requests carrying an issued token in
/// `Authorization`, either bare or as `Bearer <token>`.
pub struct Authorized;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authorized {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

        if !state.sessions.is_valid(token).await {
            return Err(AppError::Unauthorized("Invalid session token".to_string()));
        }
        Ok(Authorized)
    }
}
