//! Store trait: the abstract interface for record persistence.
//!
//! The engine never talks to a database directly. It produces
//! [`RecordChange`]s and a backend applies them; on startup it reads every
//! record back and rebuilds itself.

use async_trait::async_trait;
use warden_perms::{Record, RecordChange, RecordKey, RecordKind};

use crate::error::Result;

/// The Store trait: async interface for record persistence.
///
/// # Design Notes
///
/// - **Unique names**: named kinds (groups, operations, entity types) have
///   a per-kind unique name. The backend enforces it; a clash is
///   `StoreError::Conflict`.
/// - **Atomic batches**: [`Store::apply`] writes all changes or none.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Single-record operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new record. Fails with `AlreadyExists` if the key is taken.
    async fn create_record(&self, record: &Record) -> Result<()>;

    /// Replace an existing record. Fails with `NotFound` if it is missing.
    async fn update_record(&self, record: &Record) -> Result<()>;

    /// Get a record by key.
    async fn get_by_id(&self, key: &RecordKey) -> Result<Option<Record>>;

    /// Get a named record by its unique name.
    async fn get_by_name(&self, kind: RecordKind, name: &str) -> Result<Option<Record>>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn delete_record(&self, key: &RecordKey) -> Result<bool>;

    /// Every record of one kind, in key order.
    async fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Batches
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a batch of upserts and deletes in one transaction.
    ///
    /// Every key in the batch is cleared before any upsert is written, so a
    /// batch may move a unique name from one record to another.
    async fn apply(&self, changes: &[RecordChange]) -> Result<()>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Every record of every kind, in load order.
    fn load_all(&self) -> impl std::future::Future<Output = Result<Vec<Record>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn load_all(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for kind in RecordKind::ALL {
            records.extend(self.list_records(kind).await?);
        }
        Ok(records)
    }
}
