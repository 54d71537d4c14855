use crate::domain_model::*;
use crate::domain_port::{TokenStore, TokenStoreError};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: RwLock<Session>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    fn write(&self, f: impl FnOnce(&mut Session)) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut session);
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<AccessToken> {
        self.snapshot().access_token
    }

    fn refresh_token(&self) -> Option<RefreshToken> {
        self.snapshot().refresh_token
    }

    fn snapshot(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_access_token(&self, token: AccessToken) -> Result<(), TokenStoreError> {
        self.write(|s| s.access_token = Some(token));
        Ok(())
    }

    fn set_refresh_token(&self, token: RefreshToken) -> Result<(), TokenStoreError> {
        self.write(|s| s.refresh_token = Some(token));
        Ok(())
    }

    fn replace(&self, pair: TokenPair) -> Result<(), TokenStoreError> {
        self.write(|s| *s = Session::from(pair));
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.write(|s| *s = Session::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pair(n: usize) -> TokenPair {
        TokenPair {
            access_token: AccessToken(format!("A{n}")),
            refresh_token: RefreshToken(format!("R{n}")),
        }
    }

    #[test]
    fn clear_removes_both_tokens() {
        let store = MemoryTokenStore::with_session(pair(1).into());
        assert!(store.has_access_token());
        store.clear().unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn snapshots_never_mix_generations() {
        let store = Arc::new(MemoryTokenStore::with_session(pair(0).into()));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for n in 1..2_000 {
                    store.replace(pair(n)).unwrap();
                }
            })
        };

        for _ in 0..2_000 {
            let session = store.snapshot();
            let access = session.access_token.unwrap();
            let refresh = session.refresh_token.unwrap();
            assert_eq!(&access.as_str()[1..], &refresh.as_str()[1..]);
        }
        writer.join().unwrap();
    }
}
