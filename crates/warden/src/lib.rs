//! # Warden
//!
//! The unified API for Warden: hierarchical authorization over principals,
//! entities and slash-path operations, persisted through a pluggable store.
//!
//! ## Overview
//!
//! - **Groups**: principals belong to a forest of groups; entities to flat
//!   entity groups
//! - **Operations**: `/Account/Edit` is a child of `/Account`
//! - **Permissions**: allow or deny rules on a principal or group, against an
//!   entity, an entity group, or everything
//! - **Resolution**: the most specific matching rule wins; deny wins ties
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden::{Warden, WardenConfig};
//! use warden::store::SqliteStore;
//!
//! async fn example() -> warden::Result<()> {
//!     let store = SqliteStore::open("warden.db")?;
//!     let mut warden = Warden::open(store, WardenConfig::default()).await?;
//!
//!     let mut uow = warden.begin_unit_of_work();
//!     let ayende = uow.register_principal("Ayende");
//!     let account = uow.register_entity("account/1", None)?;
//!     uow.create_principal_group("Administrators", None)?;
//!     uow.associate_principal_with_group(ayende, "Administrators")?;
//!     uow.create_operation("/Account/Edit")?;
//!     uow.allow("/Account/Edit").for_group("Administrators").on_everything().save()?;
//!     uow.commit().await?;
//!
//!     assert!(warden.is_allowed(ayende, account, "/Account/Edit")?);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `warden::core` - Identifiers, directory, group and operation trees
//! - `warden::perms` - Rules, resolution and the editing service
//! - `warden::store` - Storage abstraction and SQLite

pub mod error;
pub mod unit_of_work;
pub mod warden;

// Re-export component crates
pub use warden_core as core;
pub use warden_perms as perms;
pub use warden_store as store;

// Re-export main types for convenience
pub use crate::warden::{Warden, WardenConfig};
pub use error::{Result, WardenError};
pub use unit_of_work::{CommitSummary, UnitOfWork};

// Re-export commonly used types
pub use warden_core::{EntityId, Group, GroupId, OperationId, PermissionId, PrincipalId};
pub use warden_perms::{
    Authorization, Decision, Effect, Permission, PermissionRequest, Reason, Subject, Target,
};
