use crate::domain_model::*;
use crate::domain_port::UserDirectory;

struct Account {
    user: User,
    password: String,
}

pub struct MemoryUserDirectory {
    accounts: Vec<Account>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            accounts: Vec::new(),
        }
    }

    pub fn with_account(mut self, user: User, password: impl Into<String>) -> Self {
        self.accounts.push(Account {
            user,
            password: password.into(),
        });
        self
    }

    /// `admin`/`1234` and `user`/`1234`.
    pub fn with_demo_accounts() -> Self {
        Self::new()
            .with_account(
                User {
                    id: UserId(1),
                    username: "admin".into(),
                    name: "Administrator".into(),
                    email: "admin@example.com".into(),
                    role: Role::Admin,
                },
                "1234",
            )
            .with_account(
                User {
                    id: UserId(2),
                    username: "user".into(),
                    name: "Regular User".into(),
                    email: "user@example.com".into(),
                    role: Role::User,
                },
                "1234",
            )
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Option<User> {
        self.accounts
            .iter()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone())
    }

    async fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        self.accounts
            .iter()
            .find(|a| a.user.username == username && a.password == password)
            .map(|a| a.user.clone())
    }

    async fn list(&self) -> Vec<User> {
        self.accounts.iter().map(|a| a.user.clone()).collect()
    }
}
