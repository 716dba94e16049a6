//! Ancestry resolution over a group forest.
//!
//! A member's direct groups are the sources; each source has exactly one
//! upward path because the forest is single-parent. Finding the shortest
//! route to a named ancestor is therefore a walk of O(depth) per source.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::group::GroupHierarchy;
use crate::membership::MembershipIndex;
use crate::types::GroupId;

/// Shortest path from one of `member`'s direct groups up to `target`.
///
/// The path starts at the chosen direct group and ends at `target`, both
/// inclusive. A direct membership in `target` yields `[target]`. An empty
/// path means no direct group reaches `target`. Equal-length candidates
/// are broken by the lower starting group id.
///
/// Fails with `NotFound` if `target` names no group.
pub fn ancestry_association<M: Copy + Ord>(
    groups: &GroupHierarchy,
    memberships: &MembershipIndex<M>,
    member: M,
    target: &str,
) -> Result<Vec<GroupId>> {
    let target_id = groups.lookup(target)?;

    let mut best: Option<Vec<GroupId>> = None;
    for start in memberships.groups_of(member) {
        let Some(path) = path_to(groups, start, target_id) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| path.len() < b.len()) {
            best = Some(path);
        }
    }

    Ok(best.unwrap_or_default())
}

/// The chain `start, start.parent, ...` up to `target`, or `None` if the walk
/// leaves the root without meeting it.
fn path_to(groups: &GroupHierarchy, start: GroupId, target: GroupId) -> Option<Vec<GroupId>> {
    let first = groups.get(start)?;
    let mut path = vec![first.id];
    if first.id == target {
        return Some(path);
    }
    for ancestor in groups.ancestors(start) {
        path.push(ancestor.id);
        if ancestor.id == target {
            return Some(path);
        }
    }
    None
}

/// Every group reachable upward from `direct`, with its minimum hop count.
///
/// Direct groups have distance 0, their parents 1, and so on. This is the
/// full ancestor closure, not just one shortest path.
pub fn group_distances(
    groups: &GroupHierarchy,
    direct: impl IntoIterator<Item = GroupId>,
) -> BTreeMap<GroupId, u32> {
    let mut distances = BTreeMap::new();
    for start in direct {
        if groups.get(start).is_none() {
            continue;
        }
        relax(&mut distances, start, 0);
        for (hops, ancestor) in groups.ancestors(start).enumerate() {
            relax(&mut distances, ancestor.id, hops as u32 + 1);
        }
    }
    distances
}

fn relax(distances: &mut BTreeMap<GroupId, u32>, id: GroupId, distance: u32) {
    distances
        .entry(id)
        .and_modify(|d| *d = (*d).min(distance))
        .or_insert(distance);
}
