use crate::application_impl::RealSessionService;
use crate::application_port::SessionService;
use crate::client::*;
use crate::domain_port::*;
use crate::infra_file::FileTokenStore;
use crate::infra_http::{HttpAuthServerClient, HttpAuthServerConfig};
use crate::infra_memory::MemoryTokenStore;
use crate::settings::Settings;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TOKEN_FILE: &str = "tokens.json";

/// Everything a caller needs to talk to the auth-protected API.
pub struct Client {
    pub store: Arc<dyn TokenStore>,
    pub auth_server: Arc<dyn AuthServerClient>,
    pub events: SessionEvents,
    pub coordinator: Arc<RefreshCoordinator>,
    pub pipeline: Arc<HttpPipeline>,
    pub session_service: Arc<dyn SessionService>,
}

impl Client {
    pub fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let cfg = &settings.client;

        let store: Arc<dyn TokenStore> = match cfg.token_store.backend.as_str() {
            "memory" => Arc::new(MemoryTokenStore::new()),
            "file" => {
                let path = cfg
                    .token_store
                    .path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string());
                Arc::new(FileTokenStore::open(path)?)
            }
            other => return Err(anyhow::anyhow!("Unknown token store backend: {}", other)),
        };

        let auth_server: Arc<dyn AuthServerClient> =
            Arc::new(HttpAuthServerClient::new(HttpAuthServerConfig {
                base_url: cfg.base_url.clone(),
                refresh_path: cfg.refresh_path.clone(),
                timeout: Duration::from_millis(cfg.timeout_ms),
            })?);

        Self::assemble(settings, store, auth_server)
    }

    /// Wires the client around an existing store and auth server client.
    pub fn assemble(
        settings: &Settings,
        store: Arc<dyn TokenStore>,
        auth_server: Arc<dyn AuthServerClient>,
    ) -> anyhow::Result<Self> {
        let cfg = &settings.client;
        let events = SessionEvents::new();

        let coordinator = Arc::new(RefreshCoordinator::new(
            auth_server.clone(),
            store.clone(),
            events.clone(),
            Duration::from_millis(cfg.refresh_timeout_ms),
        ));

        let pipeline = Arc::new(
            HttpPipeline::builder()
                .base_url(cfg.base_url.clone())
                .refresh_path(cfg.refresh_path.clone())
                .timeout(Duration::from_millis(cfg.timeout_ms))
                .log_bodies(cfg.debug)
                .store(store.clone())
                .coordinator(coordinator.clone())
                .build()?,
        );

        let session_service: Arc<dyn SessionService> = Arc::new(RealSessionService::new(
            auth_server.clone(),
            store.clone(),
            pipeline.clone(),
            events.clone(),
        ));

        tracing::info!(base_url = %cfg.base_url, store = %cfg.token_store.backend, "client ready");

        Ok(Self {
            store,
            auth_server,
            events,
            coordinator,
            pipeline,
            session_service,
        })
    }
}
