//! Per-device onboarding completion flags.
//!
//! Flags live outside the backend database in a small key-value store, keyed
//! `onboarding_completed_<user_id>` with the value `"true"`. They are not
//! synced: a second device starts without the flag.

use std::{
    collections::{BTreeMap, HashMap},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const KEY_PREFIX: &str = "onboarding_completed_";
const COMPLETED: &str = "true";

#[derive(Debug, Error)]
pub enum FlagStoreError {
    #[error("flag store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("flag store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("flag store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FlagStore: Send + Sync {
    /// `Ok(false)` when the flag is absent.
    async fn read_flag(&self, user_id: Uuid) -> Result<bool, FlagStoreError>;

    async fn write_flag(&self, user_id: Uuid) -> Result<(), FlagStoreError>;

    async fn clear_flag(&self, user_id: Uuid) -> Result<(), FlagStoreError>;
}

pub fn flag_key(user_id: Uuid) -> String {
    format!("{KEY_PREFIX}{user_id}")
}

/// JSON file backed store. The whole file is rewritten on every change
/// through a temp file and a rename.
pub struct FileFlagStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileFlagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, FlagStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), FlagStoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl FlagStore for FileFlagStore {
    async fn read_flag(&self, user_id: Uuid) -> Result<bool, FlagStoreError> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        Ok(entries.get(&flag_key(user_id)).map(String::as_str) == Some(COMPLETED))
    }

    async fn write_flag(&self, user_id: Uuid) -> Result<(), FlagStoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(flag_key(user_id), COMPLETED.to_string());
        self.store(&entries).await?;
        info!(%user_id, "onboarding marked complete");
        Ok(())
    }

    async fn clear_flag(&self, user_id: Uuid) -> Result<(), FlagStoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(&flag_key(user_id)).is_some() {
            self.store(&entries).await?;
            debug!(%user_id, "onboarding flag cleared");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFlagStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn read_flag(&self, user_id: Uuid) -> Result<bool, FlagStoreError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&flag_key(user_id)).map(String::as_str) == Some(COMPLETED))
    }

    async fn write_flag(&self, user_id: Uuid) -> Result<(), FlagStoreError> {
        self.entries
            .lock()
            .await
            .insert(flag_key(user_id), COMPLETED.to_string());
        Ok(())
    }

    async fn clear_flag(&self, user_id: Uuid) -> Result<(), FlagStoreError> {
        self.entries.lock().await.remove(&flag_key(user_id));
        Ok(())
    }
}
