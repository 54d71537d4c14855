use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const ACCESS_PREFIX: &str = "fake-access-token:";
const REFRESH_PREFIX: &str = "fake-refresh-token:";

/// In-process stand-in for the auth server.
///
/// Refresh tokens look like `fake-refresh-token:<user>:<generation>`. Each
/// successful refresh bumps the generation, and only the latest generation is
/// accepted, mirroring a rotating refresh-token server.
#[derive(Debug)]
pub struct FakeAuthServerClient {
    delay: Duration,
    refresh_calls: AtomicUsize,
    generation: Mutex<u64>,
    reject_refresh: bool,
}

impl FakeAuthServerClient {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            refresh_calls: AtomicUsize::new(0),
            generation: Mutex::new(1),
            reject_refresh: false,
        }
    }

    /// Delays every refresh exchange.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answers every refresh exchange with 401.
    pub fn rejecting_refresh(mut self) -> Self {
        self.reject_refresh = true;
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn tokens_for(username: &str, generation: u64) -> TokenPair {
        TokenPair {
            access_token: AccessToken(format!("{ACCESS_PREFIX}{username}:{generation}")),
            refresh_token: RefreshToken(format!("{REFRESH_PREFIX}{username}:{generation}")),
        }
    }

    fn unauthorized(message: &str) -> AuthServerError {
        AuthServerError::Rejected {
            status: 401,
            message: message.to_string(),
        }
    }
}

impl Default for FakeAuthServerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuthServerClient for FakeAuthServerClient {
    async fn login(&self, input: LoginInput) -> Result<LoginResult, AuthServerError> {
        if input.password != "1234" {
            return Err(AuthServerError::Rejected {
                status: 400,
                message: "invalid username or password".into(),
            });
        }
        let generation = *self.generation.lock().unwrap_or_else(|e| e.into_inner());
        Ok(LoginResult {
            user: User {
                id: UserId(1),
                username: input.username.clone(),
                name: input.username.clone(),
                email: format!("{}@example.com", input.username),
                role: Role::User,
            },
            tokens: Self::tokens_for(&input.username, generation),
        })
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthServerError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject_refresh {
            return Err(Self::unauthorized("refresh token expired"));
        }

        let (username, presented) = refresh_token
            .as_str()
            .strip_prefix(REFRESH_PREFIX)
            .and_then(|rest| rest.rsplit_once(':'))
            .and_then(|(user, generation)| Some((user, generation.parse::<u64>().ok()?)))
            .ok_or_else(|| Self::unauthorized("malformed refresh token"))?;

        let mut generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        if presented != *generation {
            return Err(Self::unauthorized("refresh token already used"));
        }
        *generation += 1;
        Ok(Self::tokens_for(username, *generation))
    }

    async fn logout(&self, _refresh_token: &RefreshToken) -> Result<(), AuthServerError> {
        Ok(())
    }
}
