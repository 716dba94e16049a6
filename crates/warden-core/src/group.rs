//! Group hierarchy: a single-parent forest of named groups.
//!
//! Principal groups and entity groups are two independent instances of
//! [`GroupHierarchy`], each with its own name namespace.
//!
//! ## Invariants
//!
//! - Every group has at most one parent and the parent relation is acyclic.
//! - `all_parents` of a group is its parent followed by the parent's
//!   `all_parents`, fixed at creation (there is no reparenting).
//! - `all_children` of a group holds every group below it.
//! - A group with direct children cannot be removed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arena::Arena;
use crate::error::{CoreError, Namespace, Result};
use crate::names::NamedIndex;
use crate::types::GroupId;

/// Which forest a group lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    /// Groups of principals (users).
    Principal,
    /// Groups of securable entities.
    Entity,
}

impl GroupKind {
    pub const fn namespace(self) -> Namespace {
        match self {
            GroupKind::Principal => Namespace::PrincipalGroup,
            GroupKind::Entity => Namespace::EntityGroup,
        }
    }
}

/// A named group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub parent: Option<GroupId>,
    /// Groups whose parent is this group.
    pub direct_children: BTreeSet<GroupId>,
    /// Every group below this one.
    pub all_children: BTreeSet<GroupId>,
    /// Every group above this one, nearest first.
    pub all_parents: Vec<GroupId>,
}

impl Group {
    fn new(id: GroupId, name: &str, parent: Option<&Group>) -> Self {
        let all_parents = match parent {
            Some(p) => std::iter::once(p.id).chain(p.all_parents.iter().copied()).collect(),
            None => Vec::new(),
        };
        Self {
            id,
            name: name.to_string(),
            parent: parent.map(|p| p.id),
            direct_children: BTreeSet::new(),
            all_children: BTreeSet::new(),
            all_parents,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.direct_children.is_empty()
    }
}

/// One forest of groups plus its name index.
#[derive(Debug, Clone)]
pub struct GroupHierarchy {
    kind: GroupKind,
    groups: Arena<GroupId, Group>,
    names: NamedIndex<GroupId>,
}

impl GroupHierarchy {
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            groups: Arena::new(),
            names: NamedIndex::new(kind.namespace()),
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Create a group, optionally under an existing parent.
    pub fn create(&mut self, name: &str, parent: Option<&str>) -> Result<GroupId> {
        self.names.ensure_available(name)?;
        let parent_id = parent.map(|p| self.lookup(p)).transpose()?;

        let parent_group = parent_id.and_then(|pid| self.groups.get(pid));
        let group = Group::new(self.groups.next_id(), name, parent_group);
        let ancestors = group.all_parents.clone();
        let id = self.groups.insert_with(|_| group);
        self.names.insert(name, id)?;

        if let Some(pid) = parent_id {
            if let Some(p) = self.groups.get_mut(pid) {
                p.direct_children.insert(id);
            }
        }
        for ancestor in ancestors {
            if let Some(a) = self.groups.get_mut(ancestor) {
                a.all_children.insert(id);
            }
        }

        debug!(kind = ?self.kind, group = %name, parent = ?parent, "created group");
        Ok(id)
    }

    /// Validate that the named group may be removed and return its id.
    ///
    /// Nothing is mutated; pair with [`GroupHierarchy::remove`].
    pub fn check_removable(&self, name: &str) -> Result<GroupId> {
        let id = self.lookup(name)?;
        let group = self.expect(id)?;
        if group.has_children() {
            return Err(CoreError::HasChildren {
                namespace: self.kind.namespace(),
                name: name.to_string(),
            });
        }
        Ok(id)
    }

    /// Remove a leaf group, detaching it from its ancestors.
    ///
    /// The returned group no longer lists any parents.
    pub fn remove(&mut self, id: GroupId) -> Result<Group> {
        let name = self.expect(id)?.name.clone();
        self.check_removable(&name)?;

        let mut group = self
            .groups
            .remove(id)
            .ok_or_else(|| CoreError::not_found(self.kind.namespace().label(), id))?;
        self.names.remove(&group.name);

        if let Some(pid) = group.parent {
            if let Some(p) = self.groups.get_mut(pid) {
                p.direct_children.remove(&id);
            }
        }
        for ancestor in &group.all_parents {
            if let Some(a) = self.groups.get_mut(*ancestor) {
                a.all_children.remove(&id);
            }
        }

        group.parent = None;
        group.all_parents.clear();
        debug!(kind = ?self.kind, group = %group.name, "removed group");
        Ok(group)
    }

    /// Rename a group. Fails if the new name is taken by another group.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<GroupId> {
        let id = self.lookup(old)?;
        self.names.rename(old, new)?;
        if let Some(group) = self.groups.get_mut(id) {
            group.name = new.to_string();
        }
        debug!(kind = ?self.kind, from = %old, to = %new, "renamed group");
        Ok(id)
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Group> {
        self.names.get(name).and_then(|id| self.groups.get(id))
    }

    /// Resolve a name to an id, failing with `NotFound`.
    pub fn lookup(&self, name: &str) -> Result<GroupId> {
        self.names.lookup(name)
    }

    /// Get a group by id, failing with `NotFound`.
    pub fn expect(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .get(id)
            .ok_or_else(|| CoreError::not_found(self.kind.namespace().label(), id))
    }

    /// Walk parent pointers upward from `id`, excluding `id` itself.
    pub fn ancestors(&self, id: GroupId) -> impl Iterator<Item = &Group> + '_ {
        let start = self.groups.get(id).and_then(|g| g.parent);
        std::iter::successors(start.and_then(|p| self.groups.get(p)), move |g| {
            g.parent.and_then(|p| self.groups.get(p))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> + '_ {
        self.groups.iter().map(|(_, g)| g)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Put back a persisted group. Call [`GroupHierarchy::relink`] once all
    /// groups are restored.
    ///
    /// A taken name or id is rejected and leaves the hierarchy unchanged.
    pub fn restore(&mut self, id: GroupId, name: &str, parent: Option<GroupId>) -> Result<()> {
        self.names.ensure_available(name)?;
        let mut group = Group::new(id, name, None);
        group.parent = parent;
        self.groups.restore(self.kind.namespace().label(), id, group)?;
        self.names.insert(name, id)
    }

    /// The id the next [`GroupHierarchy::create`] will hand out.
    pub fn next_id(&self) -> GroupId {
        self.groups.next_id()
    }

    /// Keep ids below `next` from being handed out again.
    pub fn advance_to(&mut self, next: u64) -> Result<()> {
        self.groups.advance_to(self.kind.namespace().label(), next)
    }

    /// Recompute children and ancestor sets from parent pointers.
    pub fn relink(&mut self) -> Result<()> {
        let ids: Vec<GroupId> = self.groups.iter().map(|(id, _)| id).collect();
        let limit = ids.len();

        let mut chains = Vec::with_capacity(ids.len());
        for &id in &ids {
            let mut chain = Vec::new();
            let mut cursor = self.expect(id)?.parent;
            while let Some(pid) = cursor {
                if chain.len() >= limit || pid == id {
                    return Err(CoreError::Cycle {
                        namespace: self.kind.namespace(),
                        name: self.expect(id)?.name.clone(),
                    });
                }
                chain.push(pid);
                cursor = self.expect(pid)?.parent;
            }
            chains.push((id, chain));
        }

        for (_, group) in self.groups.iter_mut() {
            group.direct_children.clear();
            group.all_children.clear();
        }
        for (id, chain) in chains {
            if let Some(&pid) = chain.first() {
                if let Some(p) = self.groups.get_mut(pid) {
                    p.direct_children.insert(id);
                }
            }
            for &ancestor in &chain {
                if let Some(a) = self.groups.get_mut(ancestor) {
                    a.all_children.insert(id);
                }
            }
            if let Some(g) = self.groups.get_mut(id) {
                g.all_parents = chain;
            }
        }
        Ok(())
    }
}
