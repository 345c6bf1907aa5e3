//! Durable session storage and the auth store built on it.
//!
//! # Design
//! - [`SessionStorage`] is a plain key/value seam so the store works against a
//!   directory on disk or an in-memory map.
//! - The token and the user record live under fixed keys and are always
//!   cleared together.
//! - Authentication is a token presence check; expiry is the server's call.
//! - On unix the storage directory is `0700` and entries are `0600`; the
//!   token is a bearer credential.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dormant_api_models::UserRecord;
use thiserror::Error;

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "jwt_token";
/// Storage key holding the JSON user record.
pub const USER_KEY: &str = "current_user";

/// Errors raised while reading or writing persisted session state.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing a storage entry failed.
    #[error("session storage failed for {path}")]
    Io {
        /// Entry location.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Encoding the user record failed.
    #[error("failed to encode session user")]
    Encode {
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Key/value storage that outlives a single console run.
pub trait SessionStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    /// Returns [`SessionError`] when the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`SessionError`] when the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Remove `key`; removing a missing key succeeds.
    ///
    /// # Errors
    /// Returns [`SessionError`] when the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `root`; the directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory backing this storage.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let path = self.entry(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        create_private_dir(&self.root).map_err(|source| SessionError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.entry(key);
        write_private(&path, value).map_err(|source| SessionError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let path = self.entry(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io { path, source }),
        }
    }
}

#[cfg(unix)]
fn create_private_dir(root: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().recursive(true).mode(0o700).create(root)
}

#[cfg(not(unix))]
fn create_private_dir(root: &Path) -> io::Result<()> {
    fs::create_dir_all(root)
}

#[cfg(unix)]
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten entries written by older runs.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(value.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    fs::write(path, value)
}

/// Process-local storage; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Authenticated session: bearer token plus the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token sent on every request.
    pub token: String,
    /// User the token was issued to.
    pub user: UserRecord,
}

/// Read/write/clear access to the persisted session.
#[derive(Clone)]
pub struct AuthStore {
    storage: Arc<dyn SessionStorage>,
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AuthStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl AuthStore {
    /// Store backed by `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Stored bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stored token");
                None
            }
        }
    }

    /// Stored user record; an unreadable record counts as absent.
    #[must_use]
    pub fn current_user(&self) -> Option<UserRecord> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stored user");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "stored user record is not valid JSON");
                None
            }
        }
    }

    /// Token presence check only.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Stored session when both halves are present.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        Some(Session {
            token: self.token()?,
            user: self.current_user()?,
        })
    }

    /// Persist a freshly issued session.
    ///
    /// # Errors
    /// Returns [`SessionError`] when either entry cannot be written.
    pub fn persist(&self, session: &Session) -> Result<(), SessionError> {
        let user = serde_json::to_string(&session.user)
            .map_err(|source| SessionError::Encode { source })?;
        self.storage.set(TOKEN_KEY, &session.token)?;
        self.storage.set(USER_KEY, &user)?;
        tracing::debug!(username = %session.user.username, "session persisted");
        Ok(())
    }

    /// Remove the token and the user record.
    ///
    /// # Errors
    /// Returns [`SessionError`] when an entry cannot be removed; the other
    /// entry is still attempted.
    pub fn clear(&self) -> Result<(), SessionError> {
        let token = self.storage.remove(TOKEN_KEY);
        let user = self.storage.remove(USER_KEY);
        tracing::debug!("session cleared");
        token.and(user)
    }
}
