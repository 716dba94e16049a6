//! # Warden Permissions
//!
//! Permission rules, their resolution, and the editing service that ties
//! the core structures together.
//!
//! ## Overview
//!
//! A permission rule attaches an [`Effect`] (allow or deny) to a subject
//! (a principal or a principal group), a target (an entity, an entity group,
//! or everything) and an operation. A check expands the principal, entity
//! and operation through their groups and ancestors, keeps the most
//! specific matching rules, and lets deny win among them. With no matching
//! rule the answer is deny.
//!
//! ## Key Types
//!
//! - [`Authorization`] - One engine instance; all edits and queries
//! - [`PermissionResolver`] - Read-only resolution over an engine
//! - [`GrantBuilder`] - Fluent `allow(..).for_group(..).on(..).save()`
//! - [`PermissionStore`] - Indexed rule table
//! - [`Record`] / [`RecordChange`] - What gets persisted, and how edits
//!   reach a store
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_perms::Authorization;
//!
//! fn example() -> warden_perms::Result<()> {
//!     let mut auth = Authorization::new();
//!     let ayende = auth.register_principal("Ayende");
//!     let account = auth.register_entity("Ayende's account", None)?;
//!
//!     auth.create_principal_group("Administrators", None)?;
//!     auth.create_operation("/Account/Edit")?;
//!     auth.associate_principal_with_group(ayende, "Administrators")?;
//!
//!     auth.allow("/Account/Edit")
//!         .for_group("Administrators")
//!         .on_everything()
//!         .save()?;
//!
//!     assert!(auth.is_allowed(ayende, account, "/Account/Edit")?);
//!     Ok(())
//! }
//! ```

pub mod editing;
pub mod error;
pub mod grant;
pub mod permission;
pub mod record;
pub mod resolver;
pub mod store;

pub use editing::Authorization;
pub use error::{PermsError, Result};
pub use grant::GrantBuilder;
pub use permission::{Effect, Permission, PermissionRequest, Subject, Target, DEFAULT_LEVEL};
pub use record::{
    GroupRecord, IdCounter, OperationRecord, Record, RecordChange, RecordKey, RecordKind,
};
pub use resolver::{Decision, Match, PermissionResolver, Reason, Specificity};
pub use store::{PermissionStore, Reference};
