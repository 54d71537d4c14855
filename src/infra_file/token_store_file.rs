use crate::domain_model::*;
use crate::domain_port::{TokenStore, TokenStoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// On-disk layout; key names match the browser storage keys the web client used.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(rename = "auth_access_token", skip_serializing_if = "Option::is_none")]
    access_token: Option<AccessToken>,
    #[serde(rename = "auth_refresh_token", skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
}

impl From<&Session> for TokenFile {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        }
    }
}

/// Write-through token store persisted as a small JSON file.
///
/// Reads are served from memory. Every write replaces the file through a
/// temporary sibling and a rename, so a crash never leaves half a pair behind.
/// The in-memory session is authoritative: it is updated even when the file
/// cannot be written.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    session: RwLock<Session>,
}

impl FileTokenStore {
    /// Opens the store, loading any tokens already on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TokenStoreError> {
        let path = path.into();
        let session = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => Session::default(),
            Ok(bytes) => {
                let file: TokenFile = serde_json::from_slice(&bytes)?;
                Session {
                    access_token: file.access_token,
                    refresh_token: file.refresh_token,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Session::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), empty = session.is_empty(), "token file opened");
        Ok(Self {
            path,
            session: RwLock::new(session),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, session: &Session) -> Result<(), TokenStoreError> {
        let tmp = self.path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(&TokenFile::from(session))?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Applies the change in memory first, then persists it. A failed write is
    /// reported but never leaves stale tokens readable.
    fn update(&self, f: impl FnOnce(&mut Session)) -> Result<(), TokenStoreError> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut session);
        self.persist(&session).inspect_err(|e| {
            tracing::warn!(path = %self.path.display(), "token file write failed: {}", e);
        })
    }
}

impl TokenStore for FileTokenStore {
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
        self.update(|s| s.access_token = Some(token))
    }

    fn set_refresh_token(&self, token: RefreshToken) -> Result<(), TokenStoreError> {
        self.update(|s| s.refresh_token = Some(token))
    }

    fn replace(&self, pair: TokenPair) -> Result<(), TokenStoreError> {
        self.update(|s| *s = Session::from(pair))
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.update(|s| *s = Session::default())
    }
}
