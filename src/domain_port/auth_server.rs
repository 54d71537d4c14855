use crate::domain_model::*;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthServerError {
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl AuthServerError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AuthServerError::Rejected { status: 401, .. })
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub tokens: TokenPair,
}

/// Client side of the external auth server.
#[async_trait::async_trait]
pub trait AuthServerClient: Send + Sync {
    async fn login(&self, input: LoginInput) -> Result<LoginResult, AuthServerError>;
    /// Exchanges a refresh token for a new pair. The old refresh token is
    /// expected to be invalid afterwards.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthServerError>;
    async fn logout(&self, refresh_token: &RefreshToken) -> Result<(), AuthServerError>;
}
