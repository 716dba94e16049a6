//! Direct memberships between members and groups.
//!
//! Only direct edges are stored. Ancestry through group parents is derived
//! by walking the hierarchy, never copied per membership.
//!
//! The index has no knowledge of removals elsewhere; the editing service
//! calls [`MembershipIndex::drop_group`] and [`MembershipIndex::drop_member`]
//! as part of its cascades.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{EntityId, GroupId, PrincipalId};

/// Many-to-many index between members of type `M` and groups.
#[derive(Debug, Clone)]
pub struct MembershipIndex<M> {
    by_member: BTreeMap<M, BTreeSet<GroupId>>,
    by_group: BTreeMap<GroupId, BTreeSet<M>>,
}

/// Principal ↔ principal-group memberships.
pub type PrincipalMemberships = MembershipIndex<PrincipalId>;

/// Entity ↔ entity-group memberships.
pub type EntityMemberships = MembershipIndex<EntityId>;

impl<M: Copy + Ord> MembershipIndex<M> {
    pub fn new() -> Self {
        Self {
            by_member: BTreeMap::new(),
            by_group: BTreeMap::new(),
        }
    }

    /// Add a direct edge. Returns `false` if it already existed.
    pub fn associate(&mut self, member: M, group: GroupId) -> bool {
        let inserted = self.by_member.entry(member).or_default().insert(group);
        if inserted {
            self.by_group.entry(group).or_default().insert(member);
        }
        inserted
    }

    /// Remove a direct edge. Returns `false` if there was none.
    pub fn detach(&mut self, member: M, group: GroupId) -> bool {
        let removed = remove_edge(&mut self.by_member, member, &group);
        if removed {
            remove_edge(&mut self.by_group, group, &member);
        }
        removed
    }

    pub fn is_member(&self, member: M, group: GroupId) -> bool {
        self.by_member
            .get(&member)
            .is_some_and(|groups| groups.contains(&group))
    }

    /// Groups `member` is directly associated with, in id order.
    pub fn groups_of(&self, member: M) -> impl Iterator<Item = GroupId> + '_ {
        self.by_member
            .get(&member)
            .into_iter()
            .flat_map(|groups| groups.iter().copied())
    }

    /// Direct members of `group`, in id order.
    pub fn members_of(&self, group: GroupId) -> impl Iterator<Item = M> + '_ {
        self.by_group
            .get(&group)
            .into_iter()
            .flat_map(|members| members.iter().copied())
    }

    /// Drop every edge referencing `group`. Returns the detached members.
    pub fn drop_group(&mut self, group: GroupId) -> Vec<M> {
        let members: Vec<M> = self
            .by_group
            .remove(&group)
            .map(|m| m.into_iter().collect())
            .unwrap_or_default();
        for member in &members {
            remove_edge(&mut self.by_member, *member, &group);
        }
        members
    }

    /// Drop every edge referencing `member`. Returns the groups it left.
    pub fn drop_member(&mut self, member: M) -> Vec<GroupId> {
        let groups: Vec<GroupId> = self
            .by_member
            .remove(&member)
            .map(|g| g.into_iter().collect())
            .unwrap_or_default();
        for group in &groups {
            remove_edge(&mut self.by_group, *group, &member);
        }
        groups
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.by_member.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }

    /// Every edge as `(member, group)`.
    pub fn iter(&self) -> impl Iterator<Item = (M, GroupId)> + '_ {
        self.by_member
            .iter()
            .flat_map(|(m, groups)| groups.iter().map(move |g| (*m, *g)))
    }
}

impl<M: Copy + Ord> Default for MembershipIndex<M> {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_edge<K: Ord, V: Ord>(map: &mut BTreeMap<K, BTreeSet<V>>, key: K, value: &V) -> bool {
    let Some(set) = map.get_mut(&key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(&key);
    }
    removed
}
