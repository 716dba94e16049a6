//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. The unique-name
//! constraint lives in the schema, so it holds even against writers that
//! bypass the engine.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use tracing::debug;
use warden_perms::{Record, RecordChange, RecordKey, RecordKind};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and its directory) and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_record(kind: &str, id: &str, body: &[u8]) -> Result<Record> {
    let record: Record =
        ciborium::from_reader(body).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let key = record.key();
    if key.kind().as_str() != kind || key.id_text() != id {
        return Err(StoreError::InvalidData(format!(
            "row {}/{} holds record {}",
            kind, id, key
        )));
    }
    Ok(record)
}

/// Turn a unique-constraint failure into `Conflict`; pass anything else on.
fn name_conflict(record: &Record, err: rusqlite::Error) -> StoreError {
    match (&err, record.unique_name()) {
        (rusqlite::Error::SqliteFailure(e, _), Some(name))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict {
                kind: record.kind().to_string(),
                name: name.to_string(),
            }
        }
        _ => StoreError::Database(err),
    }
}

fn insert_row(conn: &Connection, record: &Record) -> Result<()> {
    let key = record.key();
    let body = encode_record(record)?;
    conn.execute(
        "INSERT INTO records (kind, id, name, body, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            key.kind().as_str(),
            key.id_text(),
            record.unique_name(),
            body,
            now_millis()
        ],
    )
    .map_err(|e| name_conflict(record, e))?;
    Ok(())
}

fn delete_row(conn: &Connection, key: &RecordKey) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM records WHERE kind = ?1 AND id = ?2",
        params![key.kind().as_str(), key.id_text()],
    )?;
    Ok(deleted > 0)
}

fn key_exists(conn: &Connection, key: &RecordKey) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM records WHERE kind = ?1 AND id = ?2",
            params![key.kind().as_str(), key.id_text()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn apply_changes(tx: &Transaction<'_>, changes: &[RecordChange]) -> Result<()> {
    for change in changes {
        delete_row(tx, &change.key())?;
    }
    for change in changes {
        if let RecordChange::Upsert(record) = change {
            insert_row(tx, record)?;
        }
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_record(&self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| {
            let key = record.key();
            if key_exists(conn, &key)? {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }
            insert_row(conn, &record)
        })
        .await
    }

    async fn update_record(&self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| {
            let key = record.key();
            let body = encode_record(&record)?;
            let updated = conn
                .execute(
                    "UPDATE records SET name = ?3, body = ?4, updated_at = ?5
                     WHERE kind = ?1 AND id = ?2",
                    params![
                        key.kind().as_str(),
                        key.id_text(),
                        record.unique_name(),
                        body,
                        now_millis()
                    ],
                )
                .map_err(|e| name_conflict(&record, e))?;
            if updated == 0 {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn get_by_id(&self, key: &RecordKey) -> Result<Option<Record>> {
        let key = *key;
        self.run(move |conn| {
            let (kind, id) = (key.kind().as_str(), key.id_text());
            let body: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT body FROM records WHERE kind = ?1 AND id = ?2",
                    params![kind, id],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|b| decode_record(kind, &id, &b)).transpose()
        })
        .await
    }

    async fn get_by_name(&self, kind: RecordKind, name: &str) -> Result<Option<Record>> {
        let name = name.to_string();
        self.run(move |conn| {
            let row: Option<(String, Vec<u8>)> = conn
                .query_row(
                    "SELECT id, body FROM records WHERE kind = ?1 AND name = ?2",
                    params![kind.as_str(), name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(id, body)| decode_record(kind.as_str(), &id, &body))
                .transpose()
        })
        .await
    }

    async fn delete_record(&self, key: &RecordKey) -> Result<bool> {
        let key = *key;
        self.run(move |conn| delete_row(conn, &key)).await
    }

    async fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare("SELECT id, body FROM records WHERE kind = ?1")?;
            let rows = stmt
                .query_map(params![kind.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut records = rows
                .iter()
                .map(|(id, body)| decode_record(kind.as_str(), id, body))
                .collect::<Result<Vec<_>>>()?;
            records.sort_by_key(Record::key);
            Ok(records)
        })
        .await
    }

    async fn apply(&self, changes: &[RecordChange]) -> Result<()> {
        let changes = changes.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            apply_changes(&tx, &changes)?;
            tx.commit()?;
            debug!(changes = changes.len(), "applied record batch");
            Ok(())
        })
        .await
    }
}
