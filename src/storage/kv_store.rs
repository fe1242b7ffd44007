// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Invalid slot name: {0}")]
    InvalidSlot(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Durable key-value contract over named slots.
///
/// Every `save` replaces the whole value of one slot atomically; concurrent
/// writers to the same slot resolve last-writer-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn save(&self, name: &str, value: &[u8]) -> Result<(), StorageError>;
    async fn clear(&self, name: &str) -> Result<(), StorageError>;
    async fn clear_all(&self) -> Result<(), StorageError>;
}

fn validate_slot(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidSlot("Empty slot name".to_string()));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        || name.starts_with('.')
    {
        return Err(StorageError::InvalidSlot(name.to_string()));
    }

    Ok(())
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    slots: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    injected_error: Arc<Mutex<Option<StorageError>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation fail with `error`.
    pub async fn inject_error(&self, error: StorageError) {
        let mut injected = self.injected_error.lock().await;
        *injected = Some(error);
    }

    /// Write raw bytes, bypassing validation of the value. Used to plant corrupt data.
    pub async fn put_raw(&self, name: &str, value: Vec<u8>) {
        let mut slots = self.slots.lock().await;
        slots.insert(name.to_string(), value);
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    async fn check_injected_error(&self) -> Result<(), StorageError> {
        let mut error_opt = self.injected_error.lock().await;
        if let Some(error) = error_opt.take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_injected_error().await?;
        validate_slot(name)?;
        let slots = self.slots.lock().await;
        Ok(slots.get(name).cloned())
    }

    async fn save(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        self.check_injected_error().await?;
        validate_slot(name)?;
        let mut slots = self.slots.lock().await;
        slots.insert(name.to_string(), value.to_vec());
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<(), StorageError> {
        self.check_injected_error().await?;
        validate_slot(name)?;
        let mut slots = self.slots.lock().await;
        slots.remove(name);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        self.check_injected_error().await?;
        let mut slots = self.slots.lock().await;
        slots.clear();
        Ok(())
    }
}

/// One file per slot under `dir`. Writes land in a temp file in the same
/// directory and are renamed over the slot file.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

const SLOT_EXTENSION: &str = "slot";

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_slot(name)?;
        Ok(self.dir.join(format!("{}.{}", name, SLOT_EXTENSION)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.slot_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.slot_path(name)?;
        let dir = self.dir.clone();
        let bytes = value.to_vec();

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path)
                .map_err(|e| StorageError::Io(e.error.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(format!("write task failed: {}", e)))??;

        debug!("💾 Saved slot '{}' ({} bytes)", name, value.len());
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<(), StorageError> {
        let path = self.slot_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(SLOT_EXTENSION) {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}
