//! Session manager
//!
//! Owns the single bearer token for the lifetime of the application. Every
//! change is persisted through a [`TokenStore`] and published to subscribers
//! through a `tokio::sync::watch` channel, so a view holding a receiver sees
//! the new state on its very next `borrow()`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::error::StoreError;

/// Durable storage for the token between runs.
pub trait TokenStore: Send {
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, token: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
}

/// Keeps the token in a small JSON file next to the config.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let stored: StoredSession = serde_json::from_str(&content)?;
        Ok(Some(stored.access_token))
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            access_token: token.to_string(),
        };
        fs::write(&self.path, serde_json::to_string(&stored)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, for `--ephemeral` runs and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.token.lock().map(|t| t.clone()).unwrap_or(None))
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
        Ok(())
    }
}

pub struct Session {
    store: Box<dyn TokenStore>,
    tx: watch::Sender<Option<String>>,
}

impl Session {
    /// Start a session manager, adopting any token left by a previous run.
    ///
    /// The restored token is trusted as-is; the server rejects it on the next
    /// authenticated call if it has gone stale.
    pub fn restore(store: Box<dyn TokenStore>) -> Self {
        let token = match store.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Ignoring unreadable persisted session: {}", e);
                None
            }
        };
        if token.is_some() {
            tracing::info!("Restored persisted session");
        }
        let (tx, _) = watch::channel(token);
        Self { store, tx }
    }

    pub fn current_token(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn save_token(&self, token: &str) {
        if let Err(e) = self.store.save(token) {
            tracing::warn!("Failed to persist session: {}", e);
        }
        self.tx.send_replace(Some(token.to_string()));
        tracing::info!("Session started");
    }

    pub fn remove_token(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to remove persisted session: {}", e);
        }
        self.tx.send_replace(None);
        tracing::info!("Session ended");
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
