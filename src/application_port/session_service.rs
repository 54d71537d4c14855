use crate::domain_model::*;
use crate::domain_port::*;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("login failed: {0}")]
    Login(#[from] AuthServerError),
    #[error("token store error: {0}")]
    Store(#[from] TokenStoreError),
}

/// Client-side session lifecycle.
#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    async fn login(&self, input: LoginInput) -> Result<User, SessionError>;
    /// Always clears local tokens, even when the server call fails.
    async fn logout(&self);
    /// Fetches the signed-in user, or `None` when the session is unusable.
    async fn fetch_profile(&self) -> Option<User>;
    fn is_authenticated(&self) -> bool;
}
