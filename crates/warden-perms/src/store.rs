//! In-memory table of permission rules.
//!
//! Rules carry no uniqueness constraint: the same subject, target and
//! operation may hold several rules. Three indexes keep the cascade and
//! candidate queries proportional to the rules they touch.

use std::collections::{BTreeMap, BTreeSet};

use warden_core::{Arena, CoreError, OperationId, PermissionId};

use crate::permission::{Effect, Permission, Subject, Target};

/// Something a rule can point at. Removing it removes the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Subject(Subject),
    Target(Target),
    Operation(OperationId),
}

#[derive(Debug, Clone, Default)]
pub struct PermissionStore {
    permissions: Arena<PermissionId, Permission>,
    by_subject: BTreeMap<Subject, BTreeSet<PermissionId>>,
    by_target: BTreeMap<Target, BTreeSet<PermissionId>>,
    by_operation: BTreeMap<OperationId, BTreeSet<PermissionId>>,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new rule and return its id.
    pub fn create(
        &mut self,
        subject: Subject,
        target: Target,
        operation: OperationId,
        effect: Effect,
        level: i32,
    ) -> PermissionId {
        let id = self.permissions.insert_with(|id| Permission {
            id,
            subject,
            target,
            operation,
            effect,
            level,
        });
        self.index(id, subject, target, operation);
        id
    }

    /// Put back a persisted rule under its original id.
    pub fn restore(&mut self, permission: Permission) -> Result<(), CoreError> {
        let (id, subject, target, operation) = (
            permission.id,
            permission.subject,
            permission.target,
            permission.operation,
        );
        self.permissions.restore("permission", id, permission)?;
        self.index(id, subject, target, operation);
        Ok(())
    }

    pub fn next_id(&self) -> PermissionId {
        self.permissions.next_id()
    }

    pub fn advance_to(&mut self, next: u64) -> Result<(), CoreError> {
        self.permissions.advance_to("permission", next)
    }

    pub fn get(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.get(id)
    }

    pub fn remove(&mut self, id: PermissionId) -> Option<Permission> {
        let permission = self.permissions.remove(id)?;
        self.unindex(&permission);
        Some(permission)
    }

    /// Ids of every rule pointing at `reference`, in id order.
    pub fn referencing(&self, reference: Reference) -> Vec<PermissionId> {
        let ids = match reference {
            Reference::Subject(s) => self.by_subject.get(&s),
            Reference::Target(t) => self.by_target.get(&t),
            Reference::Operation(o) => self.by_operation.get(&o),
        };
        ids.map(|ids| ids.iter().copied().collect()).unwrap_or_default()
    }

    /// Delete every rule pointing at `reference` and return them.
    pub fn remove_all_referencing(&mut self, reference: Reference) -> Vec<Permission> {
        self.referencing(reference)
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// Rules attached to `subject`, in id order.
    pub fn by_subject(&self, subject: Subject) -> impl Iterator<Item = &Permission> + '_ {
        self.by_subject
            .get(&subject)
            .into_iter()
            .flatten()
            .filter_map(|id| self.permissions.get(*id))
    }

    /// Rules whose subject, target and operation all fall in the given sets.
    pub fn query(
        &self,
        subjects: &BTreeSet<Subject>,
        targets: &BTreeSet<Target>,
        operations: &BTreeSet<OperationId>,
    ) -> Vec<&Permission> {
        let mut matched = Vec::new();
        for subject in subjects {
            for permission in self.by_subject(*subject) {
                if targets.contains(&permission.target)
                    && operations.contains(&permission.operation)
                {
                    matched.push(permission);
                }
            }
        }
        matched.sort_by_key(|p| p.id);
        matched
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> + '_ {
        self.permissions.iter().map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    fn index(&mut self, id: PermissionId, subject: Subject, target: Target, op: OperationId) {
        self.by_subject.entry(subject).or_default().insert(id);
        self.by_target.entry(target).or_default().insert(id);
        self.by_operation.entry(op).or_default().insert(id);
    }

    fn unindex(&mut self, permission: &Permission) {
        let id = permission.id;
        unlink(&mut self.by_subject, permission.subject, id);
        unlink(&mut self.by_target, permission.target, id);
        unlink(&mut self.by_operation, permission.operation, id);
    }
}

fn unlink<K: Ord>(index: &mut BTreeMap<K, BTreeSet<PermissionId>>, key: K, id: PermissionId) {
    if let Some(ids) = index.get_mut(&key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(&key);
        }
    }
}
