use crate::application_port::{SessionError, SessionService};
use crate::client::{HttpPipeline, SessionEvent, SessionEvents};
use crate::domain_model::*;
use crate::domain_port::{AuthServerClient, LoginInput, TokenStore};
use std::sync::Arc;

const PROFILE_PATH: &str = "/api/auth/me";

pub struct RealSessionService {
    auth_server: Arc<dyn AuthServerClient>,
    store: Arc<dyn TokenStore>,
    pipeline: Arc<HttpPipeline>,
    events: SessionEvents,
}

impl RealSessionService {
    pub fn new(
        auth_server: Arc<dyn AuthServerClient>,
        store: Arc<dyn TokenStore>,
        pipeline: Arc<HttpPipeline>,
        events: SessionEvents,
    ) -> RealSessionService {
        RealSessionService {
            auth_server,
            store,
            pipeline,
            events,
        }
    }
}

#[async_trait::async_trait]
impl SessionService for RealSessionService {
    async fn login(&self, input: LoginInput) -> Result<User, SessionError> {
        let username = input.username.clone();
        let result = self.auth_server.login(input).await.inspect_err(|e| {
            tracing::warn!(%username, "login failed: {}", e);
        })?;

        self.store.replace(result.tokens)?;
        tracing::info!(user_id = %result.user.id, %username, "logged in");
        self.events.emit(SessionEvent::LoggedIn {
            user: result.user.clone(),
        });
        Ok(result.user)
    }

    async fn logout(&self) {
        if let Some(refresh_token) = self.store.refresh_token() {
            if let Err(e) = self.auth_server.logout(&refresh_token).await {
                tracing::warn!("server logout failed, clearing local session anyway: {}", e);
            }
        }

        if let Err(e) = self.store.clear() {
            tracing::error!("failed to clear tokens: {}", e);
        }
        self.events.emit(SessionEvent::LoggedOut);
    }

    async fn fetch_profile(&self) -> Option<User> {
        if !self.store.has_access_token() {
            return None;
        }

        let response = match self.pipeline.get(PROFILE_PATH).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("profile fetch failed: {}", e);
                return None;
            }
        };

        match response.data::<User>() {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("unexpected profile payload: {}", e);
                None
            }
        }
    }

    fn is_authenticated(&self) -> bool {
        self.store.has_access_token()
    }
}
