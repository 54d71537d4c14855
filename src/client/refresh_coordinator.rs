//! Single-flight access token refresh.
//!
//! Any number of requests can discover an expired access token at the same
//! time. The first one to ask for a refresh starts the exchange; everyone who
//! asks while it is in flight is queued and receives the same outcome, in the
//! order they arrived. Exactly one exchange runs per expiry event.

use super::error::RefreshError;
use super::session_events::{SessionEvent, SessionEvents, TeardownReason};
use crate::domain_model::*;
use crate::domain_port::{AuthServerClient, TokenStore};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

type Outcome = Result<AccessToken, RefreshError>;

struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<Outcome>,
}

#[derive(Default)]
struct PendingQueue {
    next_ticket: u64,
    waiters: Vec<Waiter>,
}

impl PendingQueue {
    fn push(&mut self) -> (u64, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.push(Waiter { ticket, tx });
        (ticket, rx)
    }

    fn take(&mut self) -> Vec<Waiter> {
        std::mem::take(&mut self.waiters)
    }

    fn len(&self) -> usize {
        self.waiters.len()
    }
}

/// Resolves every waiter with the same outcome, in enqueue order. Returns the
/// tickets in the order they were settled.
fn settle(waiters: Vec<Waiter>, outcome: &Outcome) -> Vec<u64> {
    waiters
        .into_iter()
        .map(|waiter| {
            // a receiver that went away just misses the result
            let _ = waiter.tx.send(outcome.clone());
            waiter.ticket
        })
        .collect()
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: PendingQueue,
}

pub struct RefreshCoordinator {
    auth_server: Arc<dyn AuthServerClient>,
    store: Arc<dyn TokenStore>,
    events: SessionEvents,
    exchange_timeout: Duration,
    // Only ever locked for short synchronous sections, never across an await.
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        auth_server: Arc<dyn AuthServerClient>,
        store: Arc<dyn TokenStore>,
        events: SessionEvents,
        exchange_timeout: Duration,
    ) -> Self {
        Self {
            auth_server,
            store,
            events,
            exchange_timeout,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_state().refreshing
    }

    /// Number of callers waiting on the in-flight exchange.
    pub fn pending(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Returns an access token that is newer than `stale`.
    ///
    /// `stale` is the token the failed request was sent with. If a refresh
    /// already settled since then, the current token is returned without a
    /// new exchange; if the session was torn down since then, the call fails
    /// without announcing the teardown again. On failure the session has been cleared and a
    /// [`SessionEvent::LoginRequired`] has been emitted once for the cycle.
    pub async fn request_refresh(
        self: &Arc<Self>,
        stale: Option<&AccessToken>,
    ) -> Result<AccessToken, RefreshError> {
        let rx = {
            let mut state = self.lock_state();

            if !state.refreshing {
                let current = self.store.snapshot();
                if stale.is_some() && current.is_empty() {
                    // torn down after the request went out; already announced
                    tracing::debug!("session already ended, not refreshing");
                    return Err(RefreshError::NoRefreshToken);
                }
                if let Some(current) = current.access_token.filter(|c| stale != Some(c)) {
                    tracing::debug!("token already refreshed, reusing current token");
                    return Ok(current);
                }
            }

            let (ticket, rx) = state.queue.push();
            if state.refreshing {
                tracing::debug!(ticket, "refresh in flight, request queued");
            } else {
                state.refreshing = true;
                tracing::debug!(ticket, "starting refresh exchange");
                // Runs detached so a caller dropping its future cannot leave
                // the coordinator stuck in the refreshing state.
                let this = Arc::clone(self);
                tokio::spawn(async move { this.run_exchange().await });
            }
            rx
        };

        rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }

    async fn run_exchange(self: Arc<Self>) {
        let outcome = match AssertUnwindSafe(self.exchange()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!("refresh exchange panicked");
                self.clear_session();
                Err(RefreshError::Abandoned)
            }
        };

        let waiters = {
            let mut state = self.lock_state();
            state.refreshing = false;
            state.queue.take()
        };

        match &outcome {
            Ok(_) => self.events.emit(SessionEvent::Refreshed),
            Err(e) => {
                tracing::warn!("token refresh failed: {}", e);
                self.events.login_required(TeardownReason::RefreshFailed);
            }
        }

        let settled = settle(waiters, &outcome);
        tracing::debug!(
            waiters = settled.len(),
            ok = outcome.is_ok(),
            "refresh settled"
        );
    }

    async fn exchange(&self) -> Outcome {
        let outcome = self.try_exchange().await;
        if outcome.is_err() {
            self.clear_session();
        }
        outcome
    }

    async fn try_exchange(&self) -> Outcome {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or(RefreshError::NoRefreshToken)?;

        let pair = tokio::time::timeout(
            self.exchange_timeout,
            self.auth_server.refresh(&refresh_token),
        )
        .await
        .map_err(|_| RefreshError::Timeout(self.exchange_timeout))??;

        let access_token = pair.access_token.clone();
        self.store.replace(pair)?;
        Ok(access_token)
    }

    fn clear_session(&self) {
        if let Err(e) = self.store.clear() {
            tracing::error!("failed to clear tokens: {}", e);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
