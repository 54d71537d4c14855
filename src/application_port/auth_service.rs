use crate::domain_model::*;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

/// Encodes and decodes bearer tokens.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, claims: &TokenClaims) -> Result<String, AuthError>;
    fn decode(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

/// Server side of token issuance and validation.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError>;
    async fn verify_token(&self, token: &AccessToken) -> Result<User, AuthError>;
    /// Rotates the refresh token: the presented token is consumed.
    async fn refresh_token(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthError>;
    async fn logout(&self, refresh_token: &RefreshToken) -> Result<(), AuthError>;
    async fn list_users(&self) -> Vec<User>;
}
