use crate::domain_model::*;

/// Read-only account lookup backing the mock auth server.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Option<User>;
    /// Returns the user only when the password matches.
    async fn authenticate(&self, username: &str, password: &str) -> Option<User>;
    async fn list(&self) -> Vec<User>;
}
