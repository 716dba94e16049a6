//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite,
//! including the unique-name constraint, but keeps everything in memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use warden_perms::{Record, RecordChange, RecordKey, RecordKind};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Clone, Default)]
struct MemoryStoreInner {
    /// Records by key.
    records: BTreeMap<RecordKey, Record>,

    /// Unique names: (kind, name) -> key.
    names: HashMap<(RecordKind, String), RecordKey>,
}

impl MemoryStoreInner {
    fn insert(&mut self, record: &Record) -> Result<()> {
        let key = record.key();
        if self.records.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        self.claim_name(record)?;
        self.records.insert(key, record.clone());
        Ok(())
    }

    fn remove(&mut self, key: &RecordKey) -> Option<Record> {
        let record = self.records.remove(key)?;
        if let Some(name) = record.unique_name() {
            self.names.remove(&(record.kind(), name.to_string()));
        }
        Some(record)
    }

    fn claim_name(&mut self, record: &Record) -> Result<()> {
        let Some(name) = record.unique_name() else {
            return Ok(());
        };
        let slot = (record.kind(), name.to_string());
        match self.names.get(&slot) {
            Some(holder) if *holder != record.key() => Err(StoreError::Conflict {
                kind: record.kind().to_string(),
                name: name.to_string(),
            }),
            _ => {
                self.names.insert(slot, record.key());
                Ok(())
            }
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_record(&self, record: &Record) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.insert(record)
    }

    async fn update_record(&self, record: &Record) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let key = record.key();
        let previous = inner
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if let Err(e) = inner.insert(record) {
            // put the old record back so a failed update changes nothing
            inner.insert(&previous)?;
            return Err(e);
        }
        Ok(())
    }

    async fn get_by_id(&self, key: &RecordKey) -> Result<Option<Record>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.records.get(key).cloned())
    }

    async fn get_by_name(&self, kind: RecordKind, name: &str) -> Result<Option<Record>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .names
            .get(&(kind, name.to_string()))
            .and_then(|key| inner.records.get(key))
            .cloned())
    }

    async fn delete_record(&self, key: &RecordKey) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.remove(key).is_some())
    }

    async fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|(key, _)| key.kind() == kind)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn apply(&self, changes: &[RecordChange]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();

        // stage on a copy so a failure leaves the store untouched
        let mut staged = inner.clone();
        for change in changes {
            staged.remove(&change.key());
        }
        for change in changes {
            if let RecordChange::Upsert(record) = change {
                staged.insert(record)?;
            }
        }

        *inner = staged;
        Ok(())
    }
}
