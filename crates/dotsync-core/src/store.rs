//! ItemStore trait for the remote note store.
//!
//! Implementations:
//! - `InMemoryStore` - For testing
//! - `JsonFileStore` (in the dotsync binary) - Items persisted in a JSON document
//!
//! A store is already authenticated when handed to the engine, and any payload
//! encryption happens inside `put_items`.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use thiserror::Error;

use crate::item::Item;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Rejected by store: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Result of a batched upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutResult {
    /// Items as accepted by the store (with fresh `updated_at`)
    pub saved: Vec<Item>,
}

/// Remote store holding tag and note items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetch every item, deleted ones included.
    async fn fetch_all(&self) -> Result<Vec<Item>>;

    /// Upsert a batch of items in one call. All-or-nothing.
    async fn put_items(&self, items: Vec<Item>) -> Result<PutResult>;
}

/// Upsert `items` into `existing` by uuid, stamping `updated_at`.
///
/// Shared by stores that keep the full item list themselves.
pub fn merge_items(existing: &mut Vec<Item>, items: Vec<Item>) -> Vec<Item> {
    let now = Utc::now();
    let mut saved = Vec::with_capacity(items.len());
    for mut item in items {
        item.updated_at = now;
        match existing.iter_mut().find(|e| e.uuid == item.uuid) {
            Some(slot) => *slot = item.clone(),
            None => existing.push(item.clone()),
        }
        saved.push(item);
    }
    saved
}

/// In-memory store for testing
#[derive(Default)]
pub struct InMemoryStore {
    items: RwLock<Vec<Item>>,
    /// Number of `put_items` calls seen
    put_calls: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_put: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with items, keeping their timestamps as given.
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items: RwLock::new(items),
            ..Self::default()
        }
    }

    /// Snapshot of everything in the store.
    pub fn items(&self) -> Vec<Item> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Items not flagged as deleted.
    pub fn live_items(&self) -> Vec<Item> {
        self.items().into_iter().filter(|i| !i.deleted).collect()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn fetch_all(&self) -> Result<Vec<Item>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection refused".into()));
        }
        Ok(self.items())
    }

    async fn put_items(&self, items: Vec<Item>) -> Result<PutResult> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection reset".into()));
        }
        let mut existing = self.items.write().unwrap_or_else(|e| e.into_inner());
        let saved = merge_items(&mut existing, items);
        Ok(PutResult { saved })
    }
}

#[async_trait]
impl<T: ItemStore> ItemStore for std::sync::Arc<T> {
    async fn fetch_all(&self) -> Result<Vec<Item>> {
        (**self).fetch_all().await
    }

    async fn put_items(&self, items: Vec<Item>) -> Result<PutResult> {
        (**self).put_items(items).await
    }
}
