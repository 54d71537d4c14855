//! Authenticated request pipeline.
//!
//! Outbound, the current access token is attached as a bearer credential.
//! Inbound, a 401 on an ordinary request triggers one refresh through the
//! [`RefreshCoordinator`] and one replay of the request. Everything else is
//! classified into an [`HttpError`] and returned unchanged.

use super::error::{HttpError, RefreshError, message_from_body};
use super::refresh_coordinator::RefreshCoordinator;
use super::request::{InboundResponse, OutboundRequest};
use super::session_events::{SessionEvents, TeardownReason};
use crate::domain_model::AccessToken;
use crate::domain_port::TokenStore;
use reqwest::{Client, ClientBuilder, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;

pub struct HttpPipeline {
    client: Client,
    base_url: String,
    refresh_path: String,
    log_bodies: bool,
    store: Arc<dyn TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    events: SessionEvents,
}

impl HttpPipeline {
    pub fn builder() -> HttpPipelineBuilder {
        HttpPipelineBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub async fn get(&self, path: &str) -> Result<InboundResponse, HttpError> {
        self.send(OutboundRequest::get(path)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<InboundResponse, HttpError> {
        self.send(OutboundRequest::post(path).json(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<InboundResponse, HttpError> {
        self.send(OutboundRequest::put(path).json(body)).await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<InboundResponse, HttpError> {
        self.send(OutboundRequest::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<InboundResponse, HttpError> {
        self.send(OutboundRequest::delete(path)).await
    }

    /// Sends a request, refreshing the access token and replaying the request
    /// once if it is rejected with 401.
    pub async fn send(&self, mut request: OutboundRequest) -> Result<InboundResponse, HttpError> {
        let mut token = self.store.access_token();

        loop {
            let response = self.dispatch(&request, token.as_ref()).await?;
            let error = match self.intercept(&request, response) {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let HttpError::AuthExpired(message) = error else {
                return Err(error);
            };

            if self.is_refresh_endpoint(&request.path) {
                tracing::warn!(request_id = %request.id, "refresh endpoint rejected: {}", message);
                self.tear_down(TeardownReason::RefreshEndpointRejected);
                return Err(HttpError::RefreshExpired(RefreshError::Rejected {
                    status: StatusCode::UNAUTHORIZED.as_u16(),
                    message,
                }));
            }

            if request.is_retried() {
                tracing::warn!(request_id = %request.id, path = %request.path, "rejected after refresh, giving up");
                self.tear_down(TeardownReason::RetryExhausted);
                return Err(HttpError::RetryExhausted);
            }

            request.mark_retried();
            let fresh = self
                .coordinator
                .request_refresh(token.as_ref())
                .await
                .map_err(HttpError::RefreshExpired)?;
            tracing::debug!(request_id = %request.id, path = %request.path, "replaying with refreshed token");
            token = Some(fresh);
        }
    }

    fn is_refresh_endpoint(&self, path: &str) -> bool {
        path.split('?').next() == Some(self.refresh_path.as_str())
    }

    fn tear_down(&self, reason: TeardownReason) {
        if let Err(e) = self.store.clear() {
            tracing::error!("failed to clear tokens: {}", e);
        }
        self.events.login_required(reason);
    }

    async fn dispatch(
        &self,
        request: &OutboundRequest,
        token: Option<&AccessToken>,
    ) -> Result<InboundResponse, HttpError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token.bearer());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        if self.log_bodies {
            tracing::debug!(
                request_id = %request.id,
                method = %request.method,
                url = %url,
                query = ?request.query,
                body = ?request.body,
                retried = request.is_retried(),
                "request"
            );
        } else {
            tracing::debug!(request_id = %request.id, method = %request.method, url = %url, "request");
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                tracing::error!(request_id = %request.id, "request setup error: {}", e);
            } else {
                tracing::error!(request_id = %request.id, "network error, no response received: {}", e);
            }
            HttpError::Transport(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(InboundResponse {
            status,
            headers,
            body,
        })
    }

    fn intercept(
        &self,
        request: &OutboundRequest,
        response: InboundResponse,
    ) -> Result<InboundResponse, HttpError> {
        let status = response.status;

        if status.is_success() {
            if self.log_bodies {
                tracing::debug!(request_id = %request.id, status = %status, body = %response.text(), "response");
            } else {
                tracing::debug!(request_id = %request.id, status = %status, "response");
            }
            return Ok(response);
        }

        let message = message_from_body(status, &response.body);
        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::info!(request_id = %request.id, "unauthorized: {}", message)
            }
            StatusCode::FORBIDDEN => {
                tracing::warn!(request_id = %request.id, "access forbidden: {}", message)
            }
            StatusCode::NOT_FOUND => {
                tracing::warn!(request_id = %request.id, "resource not found: {}", request.path)
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(request_id = %request.id, "server error: {}", message)
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(request_id = %request.id, "service unavailable")
            }
            _ => tracing::warn!(request_id = %request.id, "http error {}: {}", status, message),
        }
        Err(HttpError::from_status(status, message))
    }
}

#[derive(Default)]
pub struct HttpPipelineBuilder {
    base_url: Option<String>,
    refresh_path: Option<String>,
    timeout: Option<Duration>,
    log_bodies: bool,
    store: Option<Arc<dyn TokenStore>>,
    coordinator: Option<Arc<RefreshCoordinator>>,
}

impl HttpPipelineBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn log_bodies(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn build(self) -> anyhow::Result<HttpPipeline> {
        let base_url = self
            .base_url
            .ok_or_else(|| anyhow::anyhow!("base_url is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("token store is required"))?;
        let coordinator = self
            .coordinator
            .ok_or_else(|| anyhow::anyhow!("refresh coordinator is required"))?;

        let mut client_builder = ClientBuilder::new()
            .user_agent(concat!("tokenward/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        Ok(HttpPipeline {
            client: client_builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            refresh_path: self
                .refresh_path
                .unwrap_or_else(|| "/api/auth/refresh".to_string()),
            log_bodies: self.log_bodies,
            store,
            events: coordinator.events().clone(),
            coordinator,
        })
    }
}
