//! # Warden Core
//!
//! Pure data structures for the Warden authorization engine: the group and
//! operation hierarchies, memberships, and ancestry resolution.
//!
//! This crate contains no I/O and no permission logic. It is synchronous
//! graph bookkeeping over id-addressed tables.
//!
//! ## Key Types
//!
//! - [`GroupHierarchy`] - A single-parent forest of named groups
//! - [`OperationHierarchy`] - Slash-path operations with implicit ancestors
//! - [`MembershipIndex`] - Direct member ↔ group edges
//! - [`Directory`] - Registered principals, entities and entity types
//! - [`NamedIndex`] - Per-namespace unique name lookup
//!
//! ## Ancestry
//!
//! [`ancestry_association`] finds the shortest path from a member's direct
//! groups up to a named ancestor; [`group_distances`] computes the full
//! ancestor closure with hop counts.

pub mod ancestry;
pub mod arena;
pub mod directory;
pub mod error;
pub mod group;
pub mod membership;
pub mod names;
pub mod operation;
pub mod types;

pub use ancestry::{ancestry_association, group_distances};
pub use arena::{Arena, MAX_ID};
pub use directory::{Directory, Entity, EntityType, Principal};
pub use error::{CoreError, Namespace, Result};
pub use group::{Group, GroupHierarchy, GroupKind};
pub use membership::{EntityMemberships, MembershipIndex, PrincipalMemberships};
pub use names::NamedIndex;
pub use operation::{path_prefixes, Operation, OperationHierarchy};
pub use types::{
    EntityId, EntityTypeId, GroupId, OperationId, PermissionId, PrincipalId, SecurityKey,
};
