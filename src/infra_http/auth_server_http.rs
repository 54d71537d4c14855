use crate::client::message_from_body;
use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Accepts both `{ "data": T, ... }` and a bare `T`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Body<T> {
    Envelope { data: T },
    Bare(T),
}

impl<T> Body<T> {
    fn into_inner(self) -> T {
        match self {
            Body::Envelope { data } => data,
            Body::Bare(data) => data,
        }
    }
}

#[derive(Deserialize)]
struct LoginData {
    #[serde(flatten)]
    tokens: TokenPair,
    user: User,
}

#[derive(Debug, Clone)]
pub struct HttpAuthServerConfig {
    pub base_url: String,
    pub refresh_path: String,
    pub timeout: Duration,
}

/// Talks to the auth server directly, outside the request pipeline, so the
/// exchange itself never re-enters refresh handling.
pub struct HttpAuthServerClient {
    client: Client,
    cfg: HttpAuthServerConfig,
}

impl HttpAuthServerClient {
    pub fn new(cfg: HttpAuthServerConfig) -> Result<Self, AuthServerError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("tokenward/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthServerError::Transport(e.to_string()))?;
        let cfg = HttpAuthServerConfig {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            ..cfg
        };
        Ok(Self { client, cfg })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url, path)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, AuthServerError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("auth server request to {} failed: {}", url, e);
                AuthServerError::Transport(e.to_string())
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AuthServerError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AuthServerError::Rejected {
                status: status.as_u16(),
                message: message_from_body(status, &bytes),
            });
        }

        let body: Body<T> =
            serde_json::from_slice(&bytes).map_err(|e| AuthServerError::Decode(e.to_string()))?;
        Ok(body.into_inner())
    }
}

#[async_trait::async_trait]
impl AuthServerClient for HttpAuthServerClient {
    async fn login(&self, input: LoginInput) -> Result<LoginResult, AuthServerError> {
        let data: LoginData = self
            .post(
                LOGIN_PATH,
                json!({ "username": input.username, "password": input.password }),
            )
            .await?;
        Ok(LoginResult {
            user: data.user,
            tokens: data.tokens,
        })
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthServerError> {
        self.post(
            &self.cfg.refresh_path,
            json!({ "refreshToken": refresh_token.as_str() }),
        )
        .await
    }

    async fn logout(&self, refresh_token: &RefreshToken) -> Result<(), AuthServerError> {
        let _: serde_json::Value = self
            .post(
                LOGOUT_PATH,
                json!({ "refreshToken": refresh_token.as_str() }),
            )
            .await
            .or_else(|e| match e {
                // empty 2xx bodies are fine for logout
                AuthServerError::Decode(_) => Ok(serde_json::Value::Null),
                other => Err(other),
            })?;
        Ok(())
    }
}
