use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::UserDirectory;
use chrono::Utc;
use dashmap::DashMap;
use nanoid::nanoid;
use std::sync::Arc;
use std::time::Duration;

const NONCE_LEN: usize = 13;

#[derive(Debug, Clone)]
pub struct MockAuthConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for MockAuthConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(5 * 60),
            refresh_ttl: Duration::from_secs(60 * 60),
        }
    }
}

struct LiveRefresh {
    user_id: UserId,
    expires_at: i64,
}

/// Issues unsigned tokens and tracks live refresh tokens so that each one
/// can be exchanged at most once.
pub struct MockAuthService {
    directory: Arc<dyn UserDirectory>,
    codec: Arc<dyn TokenCodec>,
    cfg: MockAuthConfig,
    // keyed by the refresh token's nonce
    live_refresh: DashMap<String, LiveRefresh>,
}

impl MockAuthService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        codec: Arc<dyn TokenCodec>,
        cfg: MockAuthConfig,
    ) -> Self {
        Self {
            directory,
            codec,
            cfg,
            live_refresh: DashMap::new(),
        }
    }

    fn claims_for(user_id: UserId, now_ms: i64, ttl: Duration) -> Result<TokenClaims, AuthError> {
        let expires_at = i64::try_from(ttl.as_millis())
            .ok()
            .and_then(|ttl_ms| now_ms.checked_add(ttl_ms))
            .ok_or_else(|| AuthError::InternalError(format!("token ttl out of range: {:?}", ttl)))?;
        Ok(TokenClaims {
            user_id: user_id.0,
            created_at: now_ms,
            expires_at,
            random: nanoid!(NONCE_LEN),
        })
    }

    /// Drops refresh tokens that can no longer be exchanged. Returns how many
    /// were removed.
    pub fn purge_expired(&self) -> usize {
        let now_ms = Utc::now().timestamp_millis();
        let before = self.live_refresh.len();
        self.live_refresh.retain(|_, live| live.expires_at >= now_ms);
        before.saturating_sub(self.live_refresh.len())
    }

    pub fn live_refresh_tokens(&self) -> usize {
        self.live_refresh.len()
    }

    fn issue(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let now_ms = Utc::now().timestamp_millis();

        let access = Self::claims_for(user_id, now_ms, self.cfg.access_ttl)?;
        let refresh = Self::claims_for(user_id, now_ms, self.cfg.refresh_ttl)?;

        let access_token = AccessToken(self.codec.encode(&access)?);
        let refresh_token = RefreshToken(self.codec.encode(&refresh)?);

        self.live_refresh.insert(
            refresh.random,
            LiveRefresh {
                user_id,
                expires_at: refresh.expires_at,
            },
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn validate(&self, token: &str) -> Result<(TokenClaims, User), AuthError> {
        let claims = self.codec.decode(token)?;
        if claims.is_expired_at(Utc::now().timestamp_millis()) {
            return Err(AuthError::TokenExpired);
        }
        let user = self
            .directory
            .find_by_id(UserId(claims.user_id))
            .await
            .ok_or(AuthError::UserNotFound)?;
        Ok((claims, user))
    }
}

#[async_trait::async_trait]
impl AuthService for MockAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let user = self
            .directory
            .authenticate(username, password)
            .await
            .ok_or(AuthError::InvalidCredentials)?;
        let tokens = self.issue(user.id)?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(IssuedSession { tokens, user })
    }

    async fn verify_token(&self, token: &AccessToken) -> Result<User, AuthError> {
        let (_, user) = self.validate(token.as_str()).await?;
        Ok(user)
    }

    async fn refresh_token(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthError> {
        let (claims, user) = self.validate(refresh_token.as_str()).await?;

        // Rotation: consume before issuing so a replayed token loses the race.
        match self.live_refresh.remove(&claims.random) {
            Some((_, live)) if live.user_id == user.id => {}
            _ => {
                tracing::warn!(user_id = %user.id, "refresh token reused or revoked");
                return Err(AuthError::TokenInvalid);
            }
        }

        let tokens = self.issue(user.id)?;
        tracing::debug!(user_id = %user.id, "refresh token rotated");
        Ok(tokens)
    }

    async fn logout(&self, refresh_token: &RefreshToken) -> Result<(), AuthError> {
        let claims = self.codec.decode(refresh_token.as_str())?;
        self.live_refresh.remove(&claims.random);
        Ok(())
    }

    async fn list_users(&self) -> Vec<User> {
        self.directory.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::Base64JsonCodec;
    use crate::infra_memory::MemoryUserDirectory;

    fn service(cfg: MockAuthConfig) -> MockAuthService {
        MockAuthService::new(
            Arc::new(MemoryUserDirectory::with_demo_accounts()),
            Arc::new(Base64JsonCodec::new()),
            cfg,
        )
    }

    #[tokio::test]
    async fn login_issues_tokens_that_verify() {
        let svc = service(MockAuthConfig::default());
        let issued = svc.login("admin", "1234").await.unwrap();
        assert_eq!(issued.user.role, Role::Admin);

        let user = svc.verify_token(&issued.tokens.access_token).await.unwrap();
        assert_eq!(user.username, "admin");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let svc = service(MockAuthConfig::default());
        assert!(matches!(
            svc.login("admin", "nope").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn refresh_tokens_rotate() {
        let svc = service(MockAuthConfig::default());
        let issued = svc.login("user", "1234").await.unwrap();

        let rotated = svc
            .refresh_token(&issued.tokens.refresh_token)
            .await
            .unwrap();
        assert_ne!(rotated.access_token, issued.tokens.access_token);

        // the first refresh token has been consumed
        assert!(matches!(
            svc.refresh_token(&issued.tokens.refresh_token).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(svc.refresh_token(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn expired_access_token_is_reported_as_expired() {
        let svc = service(MockAuthConfig {
            access_ttl: Duration::from_millis(0),
            refresh_ttl: Duration::from_secs(60),
        });
        let issued = svc.login("user", "1234").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(matches!(
            svc.verify_token(&issued.tokens.access_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let svc = service(MockAuthConfig::default());
        let issued = svc.login("user", "1234").await.unwrap();
        svc.logout(&issued.tokens.refresh_token).await.unwrap();

        assert!(matches!(
            svc.refresh_token(&issued.tokens.refresh_token).await,
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn purge_drops_only_expired_refresh_tokens() {
        let svc = service(MockAuthConfig {
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_millis(0),
        });
        svc.login("user", "1234").await.unwrap();
        svc.login("admin", "1234").await.unwrap();
        assert_eq!(svc.live_refresh_tokens(), 2);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(svc.purge_expired(), 2);
        assert_eq!(svc.live_refresh_tokens(), 0);
    }

    #[tokio::test]
    async fn oversized_ttl_is_an_internal_error() {
        let svc = service(MockAuthConfig {
            access_ttl: Duration::from_secs(u64::MAX),
            refresh_ttl: Duration::from_secs(60),
        });

        assert!(matches!(
            svc.login("user", "1234").await,
            Err(AuthError::InternalError(_))
        ));
        assert_eq!(svc.live_refresh_tokens(), 0);
    }
}
