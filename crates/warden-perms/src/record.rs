//! Persisted record types and change tracking.
//!
//! The engine persists as a flat set of records, one per principal, entity,
//! entity type, group, operation and permission. Memberships are stored on
//! the group record they point at, so associating a member rewrites exactly
//! one record. One counter record per id-allocating table carries its next
//! id, so ids of removed records are not handed out again after a reload.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::{
    Entity, EntityId, EntityType, EntityTypeId, GroupId, OperationId, PermissionId, Principal,
    PrincipalId,
};

use crate::permission::Permission;

/// The table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    EntityType,
    Principal,
    Entity,
    PrincipalGroup,
    EntityGroup,
    Operation,
    Permission,
    Counter,
}

impl RecordKind {
    /// Every kind, in the order records must be loaded.
    pub const ALL: [RecordKind; 8] = [
        RecordKind::EntityType,
        RecordKind::Principal,
        RecordKind::Entity,
        RecordKind::PrincipalGroup,
        RecordKind::EntityGroup,
        RecordKind::Operation,
        RecordKind::Permission,
        RecordKind::Counter,
    ];

    /// Kinds whose ids are handed out by a counter.
    pub const COUNTED: [RecordKind; 6] = [
        RecordKind::Principal,
        RecordKind::Entity,
        RecordKind::PrincipalGroup,
        RecordKind::EntityGroup,
        RecordKind::Operation,
        RecordKind::Permission,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::EntityType => "entity_type",
            RecordKind::Principal => "principal",
            RecordKind::Entity => "entity",
            RecordKind::PrincipalGroup => "principal_group",
            RecordKind::EntityGroup => "entity_group",
            RecordKind::Operation => "operation",
            RecordKind::Permission => "permission",
            RecordKind::Counter => "counter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Whether records of this kind carry a unique name.
    pub const fn is_named(self) -> bool {
        matches!(
            self,
            RecordKind::EntityType
                | RecordKind::PrincipalGroup
                | RecordKind::EntityGroup
                | RecordKind::Operation
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKey {
    EntityType(EntityTypeId),
    Principal(PrincipalId),
    Entity(EntityId),
    PrincipalGroup(GroupId),
    EntityGroup(GroupId),
    Operation(OperationId),
    Permission(PermissionId),
    /// The id counter of the given table.
    Counter(RecordKind),
}

impl RecordKey {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordKey::EntityType(_) => RecordKind::EntityType,
            RecordKey::Principal(_) => RecordKind::Principal,
            RecordKey::Entity(_) => RecordKind::Entity,
            RecordKey::PrincipalGroup(_) => RecordKind::PrincipalGroup,
            RecordKey::EntityGroup(_) => RecordKind::EntityGroup,
            RecordKey::Operation(_) => RecordKind::Operation,
            RecordKey::Permission(_) => RecordKind::Permission,
            RecordKey::Counter(_) => RecordKind::Counter,
        }
    }

    /// Text form of the id, unique within the kind.
    pub fn id_text(&self) -> String {
        match self {
            RecordKey::EntityType(id) => id.to_hex(),
            RecordKey::Principal(id) => id.get().to_string(),
            RecordKey::Entity(id) => id.get().to_string(),
            RecordKey::PrincipalGroup(id) | RecordKey::EntityGroup(id) => id.get().to_string(),
            RecordKey::Operation(id) => id.get().to_string(),
            RecordKey::Permission(id) => id.get().to_string(),
            RecordKey::Counter(table) => table.as_str().to_string(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.id_text())
    }
}

/// A group together with its direct members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord<M> {
    pub id: GroupId,
    pub name: String,
    pub parent: Option<GroupId>,
    pub members: Vec<M>,
}

/// An operation's path and parent link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: OperationId,
    pub name: String,
    pub parent: Option<OperationId>,
}

/// The next id a table will hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounter {
    pub table: RecordKind,
    pub next: u64,
}

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    EntityType(EntityType),
    Principal(Principal),
    Entity(Entity),
    PrincipalGroup(GroupRecord<PrincipalId>),
    EntityGroup(GroupRecord<EntityId>),
    Operation(OperationRecord),
    Permission(Permission),
    Counter(IdCounter),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::EntityType(t) => RecordKey::EntityType(t.id),
            Record::Principal(p) => RecordKey::Principal(p.id),
            Record::Entity(e) => RecordKey::Entity(e.id),
            Record::PrincipalGroup(g) => RecordKey::PrincipalGroup(g.id),
            Record::EntityGroup(g) => RecordKey::EntityGroup(g.id),
            Record::Operation(o) => RecordKey::Operation(o.id),
            Record::Permission(p) => RecordKey::Permission(p.id),
            Record::Counter(c) => RecordKey::Counter(c.table),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.key().kind()
    }

    /// The unique name, for kinds that have one.
    pub fn unique_name(&self) -> Option<&str> {
        match self {
            Record::EntityType(t) => Some(&t.name),
            Record::PrincipalGroup(g) => Some(&g.name),
            Record::EntityGroup(g) => Some(&g.name),
            Record::Operation(o) => Some(&o.name),
            Record::Principal(_)
            | Record::Entity(_)
            | Record::Permission(_)
            | Record::Counter(_) => None,
        }
    }
}

/// A pending write produced by the editing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Upsert(Record),
    Delete(RecordKey),
}

impl RecordChange {
    pub fn key(&self) -> RecordKey {
        match self {
            RecordChange::Upsert(record) => record.key(),
            RecordChange::Delete(key) => *key,
        }
    }
}
