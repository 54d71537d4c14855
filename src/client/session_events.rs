use crate::domain_model::User;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The refresh exchange failed, timed out, or had no refresh token.
    RefreshFailed,
    /// A request was rejected again after being replayed with a new token.
    RetryExhausted,
    /// A request aimed at the refresh endpoint itself was rejected.
    RefreshEndpointRejected,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    LoggedIn { user: User },
    Refreshed,
    /// The hosting application should send the user to the login entry point.
    LoginRequired { reason: TeardownReason },
    LoggedOut,
}

/// Fan-out of session lifecycle events to whoever hosts the client.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        tracing::debug!(?event, "session event");
        // no subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn login_required(&self, reason: TeardownReason) {
        tracing::warn!(?reason, "session ended, login required");
        self.emit(SessionEvent::LoginRequired { reason });
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
