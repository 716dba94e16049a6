//! The authorization editing service.
//!
//! [`Authorization`] owns every structure of one engine instance: the
//! directory, both group forests, the operation tree, memberships and the
//! permission table. Edits take `&mut self`, queries take `&self`.
//!
//! Removals are two-phase: the precondition is checked for the whole edit
//! before anything is deleted, and the cascade (memberships, rules) only
//! deletes references, so it cannot fail once it starts.
//!
//! Every edit records the keys of the persisted records it touched.
//! [`Authorization::take_changes`] turns them into the writes a store
//! needs to apply, plus a counter record for every table whose next id
//! moved since the last call.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use warden_core::{
    ancestry_association, group_distances, Directory, Entity, EntityId, EntityMemberships,
    EntityTypeId, Group, GroupHierarchy, GroupId, GroupKind, Operation, OperationHierarchy,
    OperationId, PermissionId, Principal, PrincipalId, PrincipalMemberships, SecurityKey,
};

use crate::error::{PermsError, Result};
use crate::grant::GrantBuilder;
use crate::permission::{Effect, Permission, PermissionRequest, Subject, Target, DEFAULT_LEVEL};
use crate::record::{
    GroupRecord, IdCounter, OperationRecord, Record, RecordChange, RecordKey, RecordKind,
};
use crate::resolver::{Decision, PermissionResolver};
use crate::store::{PermissionStore, Reference};

/// One authorization engine instance.
#[derive(Debug, Clone)]
pub struct Authorization {
    directory: Directory,
    principal_groups: GroupHierarchy,
    entity_groups: GroupHierarchy,
    operations: OperationHierarchy,
    principal_memberships: PrincipalMemberships,
    entity_memberships: EntityMemberships,
    permissions: PermissionStore,
    default_level: i32,
    dirty: BTreeSet<RecordKey>,
    /// Next ids as of the last `take_changes`, per counted table.
    committed_next: BTreeMap<RecordKind, u64>,
}

impl Authorization {
    pub fn new() -> Self {
        Self::with_default_level(DEFAULT_LEVEL)
    }

    /// Create an engine whose grants default to `level`.
    pub fn with_default_level(level: i32) -> Self {
        Self {
            directory: Directory::new(),
            principal_groups: GroupHierarchy::new(GroupKind::Principal),
            entity_groups: GroupHierarchy::new(GroupKind::Entity),
            operations: OperationHierarchy::new(),
            principal_memberships: PrincipalMemberships::new(),
            entity_memberships: EntityMemberships::new(),
            permissions: PermissionStore::new(),
            default_level: level,
            dirty: BTreeSet::new(),
            committed_next: BTreeMap::new(),
        }
    }

    pub fn default_level(&self) -> i32 {
        self.default_level
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principals, entities and entity types
    // ─────────────────────────────────────────────────────────────────────────

    pub fn register_principal(&mut self, name: &str) -> PrincipalId {
        let id = self.directory.add_principal(name);
        self.dirty.insert(RecordKey::Principal(id));
        debug!(principal = %id, name, "registered principal");
        id
    }

    /// Remove a principal with its memberships and every rule naming it.
    pub fn remove_principal(&mut self, id: PrincipalId) -> Result<()> {
        self.directory.remove_principal(id)?;
        self.dirty.insert(RecordKey::Principal(id));

        let left = self.principal_memberships.drop_member(id);
        self.dirty
            .extend(left.iter().map(|g| RecordKey::PrincipalGroup(*g)));
        let removed = self.drop_rules(Reference::Subject(Subject::Principal(id)));

        debug!(
            principal = %id,
            memberships = left.len(),
            removed_permissions = removed,
            "removed principal"
        );
        Ok(())
    }

    pub fn principal(&self, id: PrincipalId) -> Option<&Principal> {
        self.directory.principal(id)
    }

    pub fn register_entity_type(&mut self, name: &str) -> Result<EntityTypeId> {
        let id = self.directory.register_entity_type(name)?;
        self.dirty.insert(RecordKey::EntityType(id));
        debug!(entity_type = name, "registered entity type");
        Ok(id)
    }

    /// Remove an entity type. Fails with `InUse` while entities carry it.
    pub fn remove_entity_type(&mut self, name: &str) -> Result<()> {
        let removed = self.directory.remove_entity_type(name)?;
        self.dirty.insert(RecordKey::EntityType(removed.id));
        debug!(entity_type = name, "removed entity type");
        Ok(())
    }

    /// Register a securable entity, optionally of a registered type.
    pub fn register_entity(&mut self, name: &str, entity_type: Option<&str>) -> Result<EntityId> {
        let id = self.directory.add_entity(name, entity_type)?;
        self.dirty.insert(RecordKey::Entity(id));
        debug!(entity = %id, name, "registered entity");
        Ok(id)
    }

    /// Remove an entity with its memberships and every rule targeting it.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<()> {
        self.directory.remove_entity(id)?;
        self.dirty.insert(RecordKey::Entity(id));

        let left = self.entity_memberships.drop_member(id);
        self.dirty
            .extend(left.iter().map(|g| RecordKey::EntityGroup(*g)));
        let removed = self.drop_rules(Reference::Target(Target::Entity(id)));

        debug!(
            entity = %id,
            memberships = left.len(),
            removed_permissions = removed,
            "removed entity"
        );
        Ok(())
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.directory.entity(id)
    }

    pub fn entity_by_security_key(&self, key: &SecurityKey) -> Option<&Entity> {
        self.directory.entity_by_security_key(key)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a principal group, optionally under an existing parent.
    pub fn create_principal_group(&mut self, name: &str, parent: Option<&str>) -> Result<GroupId> {
        let id = self.principal_groups.create(name, parent)?;
        self.dirty.insert(RecordKey::PrincipalGroup(id));
        Ok(id)
    }

    /// Create `child` as a principal group under `parent`.
    pub fn create_child_group_of(&mut self, parent: &str, child: &str) -> Result<GroupId> {
        self.create_principal_group(child, Some(parent))
    }

    /// Create an entity group. Entity groups are flat.
    pub fn create_entity_group(&mut self, name: &str) -> Result<GroupId> {
        let id = self.entity_groups.create(name, None)?;
        self.dirty.insert(RecordKey::EntityGroup(id));
        Ok(id)
    }

    /// Remove a leaf principal group with its memberships and rules.
    pub fn remove_principal_group(&mut self, name: &str) -> Result<()> {
        let id = self.principal_groups.check_removable(name)?;
        self.principal_groups.remove(id)?;
        self.dirty.insert(RecordKey::PrincipalGroup(id));

        let members = self.principal_memberships.drop_group(id);
        let removed = self.drop_rules(Reference::Subject(Subject::Group(id)));

        debug!(
            group = name,
            members = members.len(),
            removed_permissions = removed,
            "removed principal group"
        );
        Ok(())
    }

    /// Remove an entity group with its memberships and rules.
    pub fn remove_entity_group(&mut self, name: &str) -> Result<()> {
        let id = self.entity_groups.check_removable(name)?;
        self.entity_groups.remove(id)?;
        self.dirty.insert(RecordKey::EntityGroup(id));

        let members = self.entity_memberships.drop_group(id);
        let removed = self.drop_rules(Reference::Target(Target::Group(id)));

        debug!(
            group = name,
            members = members.len(),
            removed_permissions = removed,
            "removed entity group"
        );
        Ok(())
    }

    pub fn rename_principal_group(&mut self, old: &str, new: &str) -> Result<()> {
        let id = self.principal_groups.rename(old, new)?;
        self.dirty.insert(RecordKey::PrincipalGroup(id));
        Ok(())
    }

    pub fn rename_entity_group(&mut self, old: &str, new: &str) -> Result<()> {
        let id = self.entity_groups.rename(old, new)?;
        self.dirty.insert(RecordKey::EntityGroup(id));
        Ok(())
    }

    pub fn get_principal_group_by_name(&self, name: &str) -> Option<&Group> {
        self.principal_groups.get_by_name(name)
    }

    pub fn get_entity_group_by_name(&self, name: &str) -> Option<&Group> {
        self.entity_groups.get_by_name(name)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the operation at `path` and any missing ancestors.
    pub fn create_operation(&mut self, path: &str) -> Result<OperationId> {
        let created = self.operations.create_all(path)?;
        self.dirty
            .extend(created.iter().copied().map(RecordKey::Operation));
        Ok(self.operations.lookup(path)?)
    }

    /// Remove a leaf operation and every rule on it.
    pub fn remove_operation(&mut self, path: &str) -> Result<()> {
        let id = self.operations.check_removable(path)?;
        self.operations.remove(id)?;
        self.dirty.insert(RecordKey::Operation(id));

        let removed = self.drop_rules(Reference::Operation(id));
        debug!(operation = path, removed_permissions = removed, "removed operation");
        Ok(())
    }

    pub fn get_operation_by_name(&self, path: &str) -> Option<&Operation> {
        self.operations.get_by_name(path)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memberships
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `principal` to the named group. Repeating it is a no-op.
    pub fn associate_principal_with_group(&mut self, principal: PrincipalId, group: &str) -> Result<()> {
        self.directory.expect_principal(principal)?;
        let gid = self.principal_groups.lookup(group)?;
        if self.principal_memberships.associate(principal, gid) {
            self.dirty.insert(RecordKey::PrincipalGroup(gid));
            debug!(%principal, group, "associated principal");
        }
        Ok(())
    }

    /// Add `entity` to the named entity group. Repeating it is a no-op.
    pub fn associate_entity_with_group(&mut self, entity: EntityId, group: &str) -> Result<()> {
        self.directory.expect_entity(entity)?;
        let gid = self.entity_groups.lookup(group)?;
        if self.entity_memberships.associate(entity, gid) {
            self.dirty.insert(RecordKey::EntityGroup(gid));
            debug!(%entity, group, "associated entity");
        }
        Ok(())
    }

    pub fn detach_principal_from_group(&mut self, principal: PrincipalId, group: &str) -> Result<()> {
        self.directory.expect_principal(principal)?;
        let gid = self.principal_groups.lookup(group)?;
        if self.principal_memberships.detach(principal, gid) {
            self.dirty.insert(RecordKey::PrincipalGroup(gid));
        }
        Ok(())
    }

    pub fn detach_entity_from_group(&mut self, entity: EntityId, group: &str) -> Result<()> {
        self.directory.expect_entity(entity)?;
        let gid = self.entity_groups.lookup(group)?;
        if self.entity_memberships.detach(entity, gid) {
            self.dirty.insert(RecordKey::EntityGroup(gid));
        }
        Ok(())
    }

    /// Groups `principal` belongs to directly.
    pub fn associated_groups_for_principal(&self, principal: PrincipalId) -> Result<Vec<&Group>> {
        self.directory.expect_principal(principal)?;
        Ok(self
            .principal_memberships
            .groups_of(principal)
            .filter_map(|g| self.principal_groups.get(g))
            .collect())
    }

    /// Groups `entity` belongs to directly.
    pub fn associated_groups_for_entity(&self, entity: EntityId) -> Result<Vec<&Group>> {
        self.directory.expect_entity(entity)?;
        Ok(self
            .entity_memberships
            .groups_of(entity)
            .filter_map(|g| self.entity_groups.get(g))
            .collect())
    }

    /// Direct groups of `principal` and all their ancestors, nearest first.
    pub fn effective_groups_for_principal(&self, principal: PrincipalId) -> Result<Vec<&Group>> {
        self.directory.expect_principal(principal)?;
        let direct = self.principal_memberships.groups_of(principal);
        let mut ranked: Vec<(u32, GroupId)> = group_distances(&self.principal_groups, direct)
            .into_iter()
            .map(|(g, d)| (d, g))
            .collect();
        ranked.sort();
        Ok(ranked
            .into_iter()
            .filter_map(|(_, g)| self.principal_groups.get(g))
            .collect())
    }

    /// Shortest chain from one of `principal`'s direct groups up to
    /// `target`, both ends included. Empty if `target` is not reachable.
    pub fn ancestry_association(&self, principal: PrincipalId, target: &str) -> Result<Vec<&Group>> {
        self.directory.expect_principal(principal)?;
        let path = ancestry_association(
            &self.principal_groups,
            &self.principal_memberships,
            principal,
            target,
        )?;
        Ok(path
            .into_iter()
            .filter_map(|g| self.principal_groups.get(g))
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a fluent grant that allows `operation`.
    pub fn allow(&mut self, operation: &str) -> GrantBuilder<'_> {
        GrantBuilder::new(self, operation, Effect::Allow)
    }

    /// Start a fluent grant that denies `operation`.
    pub fn deny(&mut self, operation: &str) -> GrantBuilder<'_> {
        GrantBuilder::new(self, operation, Effect::Deny)
    }

    /// Store a rule. Subject, target and operation must all exist.
    pub fn grant_permission(&mut self, request: PermissionRequest) -> Result<PermissionId> {
        self.check_subject(request.subject)?;
        self.check_target(request.target)?;
        let operation = self.operations.lookup(&request.operation)?;
        let level = request.level.unwrap_or(self.default_level);

        let id = self.permissions.create(
            request.subject,
            request.target,
            operation,
            request.effect,
            level,
        );
        self.dirty.insert(RecordKey::Permission(id));
        debug!(
            permission = %id,
            subject = ?request.subject,
            target = ?request.target,
            operation = %request.operation,
            effect = %request.effect,
            level,
            "granted permission"
        );
        Ok(id)
    }

    pub fn remove_permission(&mut self, id: PermissionId) -> Result<Permission> {
        let removed = self
            .permissions
            .remove(id)
            .ok_or(PermsError::PermissionNotFound(id))?;
        self.dirty.insert(RecordKey::Permission(id));
        Ok(removed)
    }

    pub fn permission(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.get(id)
    }

    /// A read-only resolver over the current state.
    pub fn resolver(&self) -> PermissionResolver<'_> {
        PermissionResolver {
            directory: &self.directory,
            principal_groups: &self.principal_groups,
            entity_groups: &self.entity_groups,
            operations: &self.operations,
            principal_memberships: &self.principal_memberships,
            entity_memberships: &self.entity_memberships,
            permissions: &self.permissions,
        }
    }

    pub fn permissions_for(&self, principal: PrincipalId) -> Result<Vec<&Permission>> {
        self.resolver().permissions_for(principal)
    }

    pub fn permissions_for_entity(&self, principal: PrincipalId, entity: EntityId) -> Result<Vec<&Permission>> {
        self.resolver().permissions_for_entity(principal, entity)
    }

    pub fn permissions_for_operation(&self, principal: PrincipalId, operation: &str) -> Result<Vec<&Permission>> {
        self.resolver().permissions_for_operation(principal, operation)
    }

    pub fn is_allowed(&self, principal: PrincipalId, entity: EntityId, operation: &str) -> Result<bool> {
        self.resolver().is_allowed(principal, entity, operation)
    }

    pub fn is_allowed_everywhere(&self, principal: PrincipalId, operation: &str) -> Result<bool> {
        self.resolver().is_allowed_everywhere(principal, operation)
    }

    pub fn explain(&self, principal: PrincipalId, entity: EntityId, operation: &str) -> Result<Decision> {
        self.resolver().explain(principal, entity, operation)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read access to the structures
    // ─────────────────────────────────────────────────────────────────────────

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn principal_groups(&self) -> &GroupHierarchy {
        &self.principal_groups
    }

    pub fn entity_groups(&self) -> &GroupHierarchy {
        &self.entity_groups
    }

    pub fn operations(&self) -> &OperationHierarchy {
        &self.operations
    }

    pub fn permissions(&self) -> &PermissionStore {
        &self.permissions
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether any edit happened since the last [`Authorization::take_changes`].
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Drain the touched keys into store writes: deletes first, then
    /// upserts, each in key order. Counter upserts come last.
    pub fn take_changes(&mut self) -> Vec<RecordChange> {
        let mut dirty = std::mem::take(&mut self.dirty);
        for table in RecordKind::COUNTED {
            let next = self.next_id_of(table);
            if self.committed_next.get(&table).copied().unwrap_or(1) != next {
                dirty.insert(RecordKey::Counter(table));
            }
        }
        self.sync_counters();

        let (upserts, deletes): (Vec<_>, Vec<_>) = dirty
            .into_iter()
            .map(|key| match self.record(key) {
                Some(record) => RecordChange::Upsert(record),
                None => RecordChange::Delete(key),
            })
            .partition(|c| matches!(c, RecordChange::Upsert(_)));
        deletes.into_iter().chain(upserts).collect()
    }

    /// Forget pending changes without producing them.
    pub fn discard_changes(&mut self) {
        self.dirty.clear();
        self.sync_counters();
    }

    /// The current record for `key`, or `None` if it no longer exists.
    pub fn record(&self, key: RecordKey) -> Option<Record> {
        match key {
            RecordKey::EntityType(id) => self.directory.entity_type(id).cloned().map(Record::EntityType),
            RecordKey::Principal(id) => self.directory.principal(id).cloned().map(Record::Principal),
            RecordKey::Entity(id) => self.directory.entity(id).cloned().map(Record::Entity),
            RecordKey::PrincipalGroup(id) => self.principal_groups.get(id).map(|g| {
                Record::PrincipalGroup(group_record(g, self.principal_memberships.members_of(id)))
            }),
            RecordKey::EntityGroup(id) => self.entity_groups.get(id).map(|g| {
                Record::EntityGroup(group_record(g, self.entity_memberships.members_of(id)))
            }),
            RecordKey::Operation(id) => self.operations.get(id).map(|o| {
                Record::Operation(OperationRecord {
                    id: o.id,
                    name: o.name.clone(),
                    parent: o.parent,
                })
            }),
            RecordKey::Permission(id) => self.permissions.get(id).cloned().map(Record::Permission),
            RecordKey::Counter(table) => match self.next_id_of(table) {
                0 | 1 => None,
                next => Some(Record::Counter(IdCounter { table, next })),
            },
        }
    }

    /// Every record, in load order.
    pub fn records(&self) -> Vec<Record> {
        let keys = self
            .directory
            .entity_types()
            .map(|t| RecordKey::EntityType(t.id))
            .chain(self.directory.principals().map(|p| RecordKey::Principal(p.id)))
            .chain(self.directory.entities().map(|e| RecordKey::Entity(e.id)))
            .chain(self.principal_groups.iter().map(|g| RecordKey::PrincipalGroup(g.id)))
            .chain(self.entity_groups.iter().map(|g| RecordKey::EntityGroup(g.id)))
            .chain(self.operations.iter().map(|o| RecordKey::Operation(o.id)))
            .chain(self.permissions.iter().map(|p| RecordKey::Permission(p.id)))
            .chain(RecordKind::COUNTED.into_iter().map(RecordKey::Counter));
        keys.filter_map(|key| self.record(key)).collect()
    }

    /// Rebuild an engine from persisted records.
    ///
    /// Records may arrive in any order. Counter records keep ids of
    /// removed records from being handed out again. The rebuilt engine has
    /// no pending changes.
    pub fn from_records(records: impl IntoIterator<Item = Record>, default_level: i32) -> Result<Self> {
        let mut records: Vec<Record> = records.into_iter().collect();
        records.sort_by_key(Record::kind);

        let mut engine = Self::with_default_level(default_level);
        let mut principal_members = Vec::new();
        let mut entity_members = Vec::new();
        let mut rules = Vec::new();
        let mut counters = Vec::new();

        for record in records {
            match record {
                Record::EntityType(t) => engine.directory.restore_entity_type(t)?,
                Record::Principal(p) => engine.directory.restore_principal(p)?,
                Record::Entity(e) => engine.directory.restore_entity(e)?,
                Record::PrincipalGroup(g) => {
                    engine.principal_groups.restore(g.id, &g.name, g.parent)?;
                    principal_members.push((g.id, g.members));
                }
                Record::EntityGroup(g) => {
                    if g.parent.is_some() {
                        return Err(PermsError::InvalidRecord(format!(
                            "entity group '{}' has a parent",
                            g.name
                        )));
                    }
                    engine.entity_groups.restore(g.id, &g.name, None)?;
                    entity_members.push((g.id, g.members));
                }
                Record::Operation(o) => engine.operations.restore(o.id, &o.name, o.parent)?,
                Record::Permission(p) => rules.push(p),
                Record::Counter(c) => counters.push(c),
            }
        }

        engine.principal_groups.relink()?;
        engine.entity_groups.relink()?;
        engine.operations.relink()?;

        for (group, members) in principal_members {
            for member in members {
                engine.directory.expect_principal(member)?;
                engine.principal_memberships.associate(member, group);
            }
        }
        for (group, members) in entity_members {
            for member in members {
                engine.directory.expect_entity(member)?;
                engine.entity_memberships.associate(member, group);
            }
        }

        for rule in rules {
            engine.check_subject(rule.subject)?;
            engine.check_target(rule.target)?;
            engine.operations.expect(rule.operation)?;
            engine.permissions.restore(rule)?;
        }

        for counter in counters {
            engine.advance(counter)?;
        }
        engine.sync_counters();

        debug!(
            principals = engine.directory.principals().count(),
            groups = engine.principal_groups.len() + engine.entity_groups.len(),
            operations = engine.operations.len(),
            permissions = engine.permissions.len(),
            "rebuilt authorization engine"
        );
        Ok(engine)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// The next id of a counted table, or 0 for other kinds.
    fn next_id_of(&self, table: RecordKind) -> u64 {
        match table {
            RecordKind::Principal => self.directory.next_principal_id().get(),
            RecordKind::Entity => self.directory.next_entity_id().get(),
            RecordKind::PrincipalGroup => self.principal_groups.next_id().get(),
            RecordKind::EntityGroup => self.entity_groups.next_id().get(),
            RecordKind::Operation => self.operations.next_id().get(),
            RecordKind::Permission => self.permissions.next_id().get(),
            RecordKind::EntityType | RecordKind::Counter => 0,
        }
    }

    fn advance(&mut self, counter: IdCounter) -> Result<()> {
        match counter.table {
            RecordKind::Principal => self.directory.advance_principals_to(counter.next)?,
            RecordKind::Entity => self.directory.advance_entities_to(counter.next)?,
            RecordKind::PrincipalGroup => self.principal_groups.advance_to(counter.next)?,
            RecordKind::EntityGroup => self.entity_groups.advance_to(counter.next)?,
            RecordKind::Operation => self.operations.advance_to(counter.next)?,
            RecordKind::Permission => self.permissions.advance_to(counter.next)?,
            RecordKind::EntityType | RecordKind::Counter => {
                return Err(PermsError::InvalidRecord(format!(
                    "'{}' has no id counter",
                    counter.table
                )))
            }
        }
        Ok(())
    }

    fn sync_counters(&mut self) {
        self.committed_next = RecordKind::COUNTED
            .into_iter()
            .map(|table| (table, self.next_id_of(table)))
            .collect();
    }

    fn drop_rules(&mut self, reference: Reference) -> usize {
        let removed = self.permissions.remove_all_referencing(reference);
        self.dirty
            .extend(removed.iter().map(|p| RecordKey::Permission(p.id)));
        removed.len()
    }

    fn check_subject(&self, subject: Subject) -> Result<()> {
        match subject {
            Subject::Principal(id) => {
                self.directory.expect_principal(id)?;
            }
            Subject::Group(id) => {
                self.principal_groups.expect(id)?;
            }
        }
        Ok(())
    }

    fn check_target(&self, target: Target) -> Result<()> {
        match target {
            Target::Entity(id) => {
                self.directory.expect_entity(id)?;
            }
            Target::Group(id) => {
                self.entity_groups.expect(id)?;
            }
            Target::Everything => {}
        }
        Ok(())
    }
}

impl Default for Authorization {
    fn default() -> Self {
        Self::new()
    }
}

fn group_record<M>(group: &Group, members: impl Iterator<Item = M>) -> GroupRecord<M> {
    GroupRecord {
        id: group.id,
        name: group.name.clone(),
        parent: group.parent,
        members: members.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use warden_core::CoreError;

    fn seeded() -> (Authorization, PrincipalId, EntityId) {
        let mut auth = Authorization::new();
        let ayende = auth.register_principal("Ayende");
        let account = auth.register_entity("Ayende's account", None).unwrap();
        auth.create_principal_group("Administrators", None).unwrap();
        auth.create_entity_group("Important Accounts").unwrap();
        auth.create_operation("/Account/Edit").unwrap();
        auth.associate_principal_with_group(ayende, "Administrators")
            .unwrap();
        auth.associate_entity_with_group(account, "Important Accounts")
            .unwrap();
        (auth, ayende, account)
    }

    #[test]
    fn test_create_group_twice_fails() {
        let mut auth = Authorization::new();
        auth.create_principal_group("Admins", None).unwrap();
        let err = auth.create_principal_group("Admins", None).unwrap_err();
        assert!(matches!(err, PermsError::Core(CoreError::DuplicateName { .. })));
    }

    #[test]
    fn test_remove_group_with_children_fails() {
        let mut auth = Authorization::new();
        auth.create_principal_group("Admins", None).unwrap();
        auth.create_child_group_of("Admins", "DBA").unwrap();

        let err = auth.remove_principal_group("Admins").unwrap_err();
        assert!(matches!(err, PermsError::Core(CoreError::HasChildren { .. })));
        assert!(auth.get_principal_group_by_name("Admins").is_some());

        auth.remove_principal_group("DBA").unwrap();
        assert!(auth.get_principal_group_by_name("DBA").is_none());
        assert!(!auth.get_principal_group_by_name("Admins").unwrap().has_children());
    }

    #[test]
    fn test_remove_group_cascades_memberships_and_rules() {
        let (mut auth, ayende, _) = seeded();
        auth.allow("/Account/Edit")
            .for_group("Administrators")
            .on_everything()
            .save()
            .unwrap();
        assert_eq!(auth.permissions_for(ayende).unwrap().len(), 1);
        assert_eq!(auth.associated_groups_for_principal(ayende).unwrap().len(), 1);

        auth.remove_principal_group("Administrators").unwrap();

        assert!(auth.permissions_for(ayende).unwrap().is_empty());
        assert!(auth.associated_groups_for_principal(ayende).unwrap().is_empty());
        assert!(auth.permissions().is_empty());
    }

    #[test]
    fn test_remove_entity_group_cascades_rules() {
        let (mut auth, ayende, account) = seeded();
        auth.allow("/Account/Edit")
            .for_principal(ayende)
            .on_group("Important Accounts")
            .save()
            .unwrap();

        auth.remove_entity_group("Important Accounts").unwrap();
        assert!(auth.permissions_for(ayende).unwrap().is_empty());
        assert!(auth.associated_groups_for_entity(account).unwrap().is_empty());
    }

    #[test]
    fn test_remove_operation_cascades_rules() {
        let (mut auth, ayende, _) = seeded();
        auth.allow("/Account/Edit")
            .for_principal(ayende)
            .on_everything()
            .save()
            .unwrap();

        let err = auth.remove_operation("/Account").unwrap_err();
        assert!(matches!(err, PermsError::Core(CoreError::HasChildren { .. })));

        auth.remove_operation("/Account/Edit").unwrap();
        assert!(auth.permissions().is_empty());
        assert!(auth
            .get_operation_by_name("/Account")
            .unwrap()
            .children
            .is_empty());
    }

    #[test]
    fn test_remove_principal_cascades() {
        let (mut auth, ayende, _) = seeded();
        auth.deny("/Account/Edit")
            .for_principal(ayende)
            .on_everything()
            .save()
            .unwrap();

        auth.remove_principal(ayende).unwrap();
        assert!(auth.principal(ayende).is_none());
        assert!(auth.permissions().is_empty());
        let admins = auth.get_principal_group_by_name("Administrators").unwrap().id;
        assert_eq!(auth.principal_memberships.members_of(admins).count(), 0);
        assert!(matches!(
            auth.permissions_for(ayende).unwrap_err(),
            PermsError::Core(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_group() {
        let (mut auth, ayende, _) = seeded();
        auth.create_principal_group("Users", None).unwrap();

        let err = auth.rename_principal_group("Administrators", "Users").unwrap_err();
        assert!(matches!(err, PermsError::Core(CoreError::DuplicateName { .. })));

        auth.rename_principal_group("Administrators", "Admins").unwrap();
        assert!(auth.get_principal_group_by_name("Administrators").is_none());
        let groups = auth.associated_groups_for_principal(ayende).unwrap();
        assert_eq!(groups[0].name, "Admins");
    }

    #[test]
    fn test_associate_is_idempotent() {
        let (mut auth, ayende, _) = seeded();
        auth.take_changes();
        auth.associate_principal_with_group(ayende, "Administrators")
            .unwrap();
        assert!(!auth.has_changes());
        assert_eq!(auth.associated_groups_for_principal(ayende).unwrap().len(), 1);
    }

    #[test]
    fn test_associate_with_missing_group() {
        let (mut auth, ayende, _) = seeded();
        let err = auth
            .associate_principal_with_group(ayende, "Nobody")
            .unwrap_err();
        assert_eq!(err.to_string(), "principal group not found: Nobody");
    }

    #[test]
    fn test_effective_groups_include_ancestors() {
        let mut auth = Authorization::new();
        let ayende = auth.register_principal("Ayende");
        auth.create_principal_group("Admins", None).unwrap();
        auth.create_child_group_of("Admins", "DBA").unwrap();
        auth.associate_principal_with_group(ayende, "DBA").unwrap();

        let names: Vec<&str> = auth
            .effective_groups_for_principal(ayende)
            .unwrap()
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        assert_eq!(names, vec!["DBA", "Admins"]);
        assert_eq!(auth.associated_groups_for_principal(ayende).unwrap().len(), 1);
    }

    #[test]
    fn test_take_changes_orders_deletes_first() {
        let (mut auth, _, _) = seeded();
        auth.take_changes();

        auth.create_principal_group("Temp", None).unwrap();
        auth.remove_operation("/Account/Edit").unwrap();
        let changes = auth.take_changes();

        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[0], RecordChange::Delete(RecordKey::Operation(_))));
        assert!(matches!(changes[1], RecordChange::Upsert(Record::PrincipalGroup(_))));
        assert!(matches!(
            changes[2],
            RecordChange::Upsert(Record::Counter(IdCounter {
                table: RecordKind::PrincipalGroup,
                ..
            }))
        ));
        assert!(!auth.has_changes());
        assert!(auth.take_changes().is_empty());
    }

    #[test]
    fn test_create_then_remove_yields_delete() {
        let mut auth = Authorization::new();
        auth.create_entity_group("Scratch").unwrap();
        auth.remove_entity_group("Scratch").unwrap();

        let changes = auth.take_changes();
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], RecordChange::Delete(RecordKey::EntityGroup(_))));
        // the id stays spent
        assert_eq!(
            changes[1],
            RecordChange::Upsert(Record::Counter(IdCounter {
                table: RecordKind::EntityGroup,
                next: 2,
            }))
        );
    }

    #[test]
    fn test_create_operation_marks_only_new_operations() {
        let mut auth = Authorization::new();
        auth.create_operation("/Account/Edit").unwrap();
        auth.take_changes();

        auth.create_operation("/Account/Delete").unwrap();
        let operations: Vec<String> = auth
            .take_changes()
            .into_iter()
            .filter_map(|c| match c {
                RecordChange::Upsert(Record::Operation(o)) => Some(o.name),
                _ => None,
            })
            .collect();
        assert_eq!(operations, vec!["/Account/Delete".to_string()]);
    }

    #[test]
    fn test_removed_ids_stay_spent_after_rebuild() {
        let mut auth = Authorization::new();
        let alice = auth.register_principal("alice");
        let bob = auth.register_principal("bob");
        auth.create_operation("/Account/Edit").unwrap();
        auth.remove_principal(bob).unwrap();
        auth.remove_operation("/Account/Edit").unwrap();

        let mut rebuilt = Authorization::from_records(auth.records(), DEFAULT_LEVEL).unwrap();
        assert!(!rebuilt.has_changes());
        assert!(rebuilt.take_changes().is_empty());

        let mallory = rebuilt.register_principal("mallory");
        assert!(mallory > bob);
        assert_ne!(mallory, alice);
        let delete = rebuilt.create_operation("/Account/Delete").unwrap();
        assert_eq!(delete, OperationId::new(3));
    }

    #[test]
    fn test_rebuild_rejects_bad_counters() {
        let (auth, _, _) = seeded();
        let mut records = auth.records();
        records.push(Record::Counter(IdCounter {
            table: RecordKind::EntityType,
            next: 3,
        }));
        assert!(matches!(
            Authorization::from_records(records, DEFAULT_LEVEL).unwrap_err(),
            PermsError::InvalidRecord(_)
        ));

        let mut records = auth.records();
        records.retain(|r| r.kind() != RecordKind::Counter);
        records.push(Record::Counter(IdCounter {
            table: RecordKind::Permission,
            next: u64::MAX,
        }));
        assert!(matches!(
            Authorization::from_records(records, DEFAULT_LEVEL).unwrap_err(),
            PermsError::Core(CoreError::IdOutOfRange { .. })
        ));
    }

    #[test]
    fn test_rebuild_rejects_operation_with_wrong_parent() {
        let records = vec![
            Record::Operation(OperationRecord {
                id: OperationId::new(1),
                name: "/A".into(),
                parent: Some(OperationId::new(2)),
            }),
            Record::Operation(OperationRecord {
                id: OperationId::new(2),
                name: "/B".into(),
                parent: Some(OperationId::new(1)),
            }),
        ];
        let err = Authorization::from_records(records, DEFAULT_LEVEL).unwrap_err();
        assert!(matches!(err, PermsError::Core(CoreError::InvalidPath { .. })));
    }

    #[test]
    fn test_rebuild_rejects_duplicate_group_ids() {
        let group = |name: &str| {
            Record::PrincipalGroup(GroupRecord {
                id: GroupId::new(1),
                name: name.into(),
                parent: None,
                members: Vec::new(),
            })
        };
        let err = Authorization::from_records(vec![group("Admins"), group("Users")], DEFAULT_LEVEL)
            .unwrap_err();
        assert!(matches!(err, PermsError::Core(CoreError::DuplicateId { .. })));
    }

    #[test]
    fn test_records_rebuild_equivalent_engine() {
        let (mut auth, ayende, account) = seeded();
        auth.create_child_group_of("Administrators", "DBA").unwrap();
        auth.deny("/Account")
            .for_group("DBA")
            .on(account)
            .level(5)
            .save()
            .unwrap();
        auth.allow("/Account/Edit")
            .for_group("Administrators")
            .on_group("Important Accounts")
            .save()
            .unwrap();

        let rebuilt = Authorization::from_records(auth.records(), DEFAULT_LEVEL).unwrap();
        assert!(!rebuilt.has_changes());
        assert_eq!(rebuilt.records(), auth.records());
        assert!(rebuilt.is_allowed(ayende, account, "/Account/Edit").unwrap());
        assert_eq!(
            rebuilt.get_principal_group_by_name("DBA").unwrap().all_parents,
            auth.get_principal_group_by_name("DBA").unwrap().all_parents
        );

        // ids keep counting from where the original left off
        let mut rebuilt = rebuilt;
        let next = rebuilt.create_principal_group("Auditors", None).unwrap();
        assert!(next > auth.get_principal_group_by_name("DBA").unwrap().id);
    }

    #[test]
    fn test_from_records_rejects_dangling_rule() {
        let (mut auth, ayende, _) = seeded();
        auth.allow("/Account/Edit")
            .for_principal(ayende)
            .on_everything()
            .save()
            .unwrap();

        let records: Vec<Record> = auth
            .records()
            .into_iter()
            .filter(|r| !matches!(r, Record::Principal(_)))
            .collect();
        assert!(Authorization::from_records(records, DEFAULT_LEVEL).is_err());
    }

    proptest! {
        #[test]
        fn prop_rebuild_never_reissues_removed_ids(
            steps in prop::collection::vec(any::<bool>(), 1..40),
            reload_at in 0usize..40,
        ) {
            let mut auth = Authorization::new();
            let mut issued = Vec::new();
            let mut live = Vec::new();
            for (i, register) in steps.iter().enumerate() {
                if i == reload_at {
                    auth.take_changes();
                    auth = Authorization::from_records(auth.records(), DEFAULT_LEVEL).unwrap();
                }
                if *register || live.is_empty() {
                    let id = auth.register_principal(&format!("p{i}"));
                    prop_assert!(!issued.contains(&id), "{} handed out twice", id);
                    issued.push(id);
                    live.push(id);
                } else {
                    let id = live.pop().unwrap();
                    auth.remove_principal(id).unwrap();
                }
            }

            let rebuilt = Authorization::from_records(auth.records(), DEFAULT_LEVEL).unwrap();
            prop_assert_eq!(rebuilt.records(), auth.records());
        }
    }
}
