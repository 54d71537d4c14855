use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt token file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key-value persistence for the current session's tokens.
///
/// Reads never fail; writes report persistence errors. `replace` and `clear`
/// act on both tokens under one write, so a `snapshot` never observes a pair
/// mixed from two different refresh cycles.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<AccessToken>;
    fn refresh_token(&self) -> Option<RefreshToken>;
    fn snapshot(&self) -> Session;
    fn set_access_token(&self, token: AccessToken) -> Result<(), TokenStoreError>;
    fn set_refresh_token(&self, token: RefreshToken) -> Result<(), TokenStoreError>;
    fn replace(&self, pair: TokenPair) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;

    fn has_access_token(&self) -> bool {
        self.access_token().is_some()
    }
}
