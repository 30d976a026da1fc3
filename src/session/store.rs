//! Session persistence backends.
//!
//! The lifecycle core only ever calls [`SessionStore::persist`], and only
//! from the background [`SessionPersister`](super::SessionPersister).
//! `load` and `remove` are here for the connect handler that resumes or
//! clears a session on CONNECT.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::identifiers::ClientId;

use super::Session;

// ============================================================================
// SessionStore
// ============================================================================

/// Storage for sessions keyed by client ID.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the stored session for a client.
    async fn load(&self, client_id: &ClientId) -> Result<Option<Session>>;

    /// Stores a session, replacing any previous one for the same client.
    async fn persist(&self, session: Session) -> Result<()>;

    /// Deletes the stored session for a client. Missing entries are fine.
    async fn remove(&self, client_id: &ClientId) -> Result<()>;
}

// ============================================================================
// MemorySessionStore
// ============================================================================

/// In-process session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<FxHashMap<ClientId, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Returns `true` if a session is stored for the client.
    #[inline]
    #[must_use]
    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.sessions.read().contains_key(client_id)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, client_id: &ClientId) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(client_id).cloned())
    }

    async fn persist(&self, session: Session) -> Result<()> {
        trace!(client_id = %session.client_id(), "Session stored in memory");
        self.sessions
            .write()
            .insert(session.client_id().clone(), session);
        Ok(())
    }

    async fn remove(&self, client_id: &ClientId) -> Result<()> {
        self.sessions.write().remove(client_id);
        Ok(())
    }
}

// ============================================================================
// FileSessionStore
// ============================================================================

/// Suffix counter for scratch files.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Session store writing one JSON document per client.
///
/// File names are the hex-encoded client identifier, so any identifier
/// the protocol allows maps to a safe, unique file name.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the directory cannot be
    /// created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "File session store opened");
        Ok(Self { dir })
    }

    /// Returns the root directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for a client.
    fn path_for(&self, client_id: &ClientId) -> PathBuf {
        let mut name = String::with_capacity(client_id.as_str().len() * 2 + 5);
        for byte in client_id.as_str().bytes() {
            let _ = write!(name, "{byte:02x}");
        }
        // Zero-length identifiers are legal on the wire.
        if name.is_empty() {
            name.push('_');
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, client_id: &ClientId) -> Result<Option<Session>> {
        match tokio::fs::read(self.path_for(client_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, session: Session) -> Result<()> {
        let path = self.path_for(session.client_id());
        let bytes = serde_json::to_vec(&session)?;

        // Each write gets its own scratch file so concurrent writers for
        // one client never share a partially written document.
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));

        let written = match tokio::fs::write(&tmp, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(path = %tmp.display(), error = %cleanup, "Scratch file left behind");
            }
            return Err(e.into());
        }

        trace!(client_id = %session.client_id(), path = %path.display(), "Session written");
        Ok(())
    }

    async fn remove(&self, client_id: &ClientId) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(client_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
