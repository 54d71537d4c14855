use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::MemoryUserDirectory;
use crate::settings::Settings;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let directory: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::with_demo_accounts());
        let token_codec: Arc<dyn TokenCodec> = Arc::new(Base64JsonCodec::new());

        let mock_auth = match settings.auth.backend.as_str() {
            "mock" => Arc::new(MockAuthService::new(
                directory,
                token_codec,
                MockAuthConfig {
                    access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
                    refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
                },
            )),
            other => return Err(anyhow::anyhow!("Unknown auth backend: {}", other)),
        };

        let cancel = CancellationToken::new();
        let sweeper_handle = tokio::spawn(sweep_refresh_tokens(mock_auth.clone(), cancel.clone()));

        info!(
            access_ttl_secs = settings.auth.access_ttl_secs,
            refresh_ttl_secs = settings.auth.refresh_ttl_secs,
            "server started"
        );

        Ok(Self {
            auth_service: mock_auth,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }
    }
}

async fn sweep_refresh_tokens(auth: Arc<MockAuthService>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let purged = auth.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "expired refresh tokens purged");
                }
            }
        }
    }
}
