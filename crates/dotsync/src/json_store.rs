//! Item store persisted as a single JSON document.
//!
//! Items are stored in `items.json` (by default under the platform data
//! directory). The whole document is rewritten on every accepted batch.

use async_trait::async_trait;
use dotsync_core::item::Item;
use dotsync_core::store::{merge_items, ItemStore, PutResult, Result, StoreError};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// On-disk document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoredItems {
    pub items: Vec<Item>,
}

pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document; a missing file is an empty store.
    pub async fn load(&self) -> Result<StoredItems> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoredItems::default()),
            Err(e) => return Err(transport(&self.path, e)),
        };
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Decode(format!("{}: {}", self.path.display(), e)))
    }

    pub async fn save(&self, stored: &StoredItems) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| transport(parent, e))?;
        }

        let contents = serde_json::to_string_pretty(stored)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        fs::write(&self.path, contents)
            .await
            .map_err(|e| transport(&self.path, e))
    }
}

fn transport(path: &Path, e: io::Error) -> StoreError {
    StoreError::Transport(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl ItemStore for JsonFileStore {
    async fn fetch_all(&self) -> Result<Vec<Item>> {
        let stored = self.load().await?;
        debug!("Loaded {} items from {}", stored.items.len(), self.path.display());
        Ok(stored.items)
    }

    async fn put_items(&self, items: Vec<Item>) -> Result<PutResult> {
        let _guard = self.lock.lock().await;
        let mut stored = self.load().await?;
        let saved = merge_items(&mut stored.items, items);
        self.save(&stored).await?;
        debug!("Saved {} items to {}", saved.len(), self.path.display());
        Ok(PutResult { saved })
    }
}
