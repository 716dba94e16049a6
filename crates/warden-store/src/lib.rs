//! # Warden Store
//!
//! Storage abstraction for Warden. Provides a trait-based interface for
//! record persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The engine persists as a flat set of [`Record`](warden_perms::Record)s.
//! The [`Store`] trait reads and writes them one at a time or as an atomic
//! batch. The primary implementation is [`SqliteStore`], with
//! [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`StoreExt`] - Convenience helpers on top of [`Store`]
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_store::{SqliteStore, StoreExt};
//!
//! async fn example() -> warden_store::Result<()> {
//!     let store = SqliteStore::open("warden.db")?;
//!     let records = store.load_all().await?;
//!     println!("{} records", records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Unique names**: groups, operations and entity types have a unique
//!   name per kind, enforced by the backend (`UNIQUE(kind, name)` in SQLite)
//! - **Bodies**: records are stored as CBOR next to their indexed columns

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreExt};
