//! Permission resolution.
//!
//! A check expands the principal, the entity and the operation into
//! candidate sets, each candidate tagged with how specifically it matches.
//! Matching rules are ranked by the specificity tuple (principal, entity,
//! operation) compared lexicographically, and only the maximal rules take
//! part in the allow/deny decision. No matching rule means deny.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;
use warden_core::{
    group_distances, path_prefixes, Directory, EntityId, EntityMemberships, GroupHierarchy,
    OperationHierarchy, OperationId, PermissionId, PrincipalId, PrincipalMemberships,
};

use crate::error::Result;
use crate::permission::{Effect, Permission, Subject, Target};
use crate::store::PermissionStore;

/// How one candidate matches along one dimension.
///
/// Ordered from least to most specific: `Everything`, then `Inherited`
/// with larger distances first, then `Exact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Match {
    /// The wildcard target. Only occurs in the entity dimension.
    Everything,
    /// Through a group or an ancestor operation, `distance` hops away.
    /// A direct group membership has distance 0.
    Inherited { distance: u32 },
    /// The principal, entity or operation itself.
    Exact,
}

impl Match {
    fn rank(self) -> (u8, Reverse<u32>) {
        match self {
            Match::Everything => (0, Reverse(0)),
            Match::Inherited { distance } => (1, Reverse(distance)),
            Match::Exact => (2, Reverse(0)),
        }
    }
}

impl Ord for Match {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Match {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How specifically a rule matches a check. Greater is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    pub principal: Match,
    pub entity: Match,
    pub operation: Match,
}

/// Why a check came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// No rule matched any candidate.
    NoMatchingRule,
    /// The deciding rules all allow.
    Allowed,
    /// At least one deciding rule denies.
    Denied,
}

/// The outcome of a check together with the rules that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Reason,
    /// For `Denied`, the denying rules; for `Allowed`, the allowing ones.
    pub deciding: Vec<PermissionId>,
    /// Specificity of the deciding rules, if any rule matched.
    pub specificity: Option<Specificity>,
}

impl Decision {
    fn no_match() -> Self {
        Self {
            allowed: false,
            reason: Reason::NoMatchingRule,
            deciding: Vec::new(),
            specificity: None,
        }
    }
}

/// Read-only view over the engine used to answer permission queries.
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'a> {
    pub(crate) directory: &'a Directory,
    pub(crate) principal_groups: &'a GroupHierarchy,
    pub(crate) entity_groups: &'a GroupHierarchy,
    pub(crate) operations: &'a OperationHierarchy,
    pub(crate) principal_memberships: &'a PrincipalMemberships,
    pub(crate) entity_memberships: &'a EntityMemberships,
    pub(crate) permissions: &'a PermissionStore,
}

impl<'a> PermissionResolver<'a> {
    /// Whether `principal` may perform `operation` on `entity`.
    pub fn is_allowed(&self, principal: PrincipalId, entity: EntityId, operation: &str) -> Result<bool> {
        Ok(self.explain(principal, entity, operation)?.allowed)
    }

    /// Like [`PermissionResolver::is_allowed`], with the deciding rules.
    pub fn explain(&self, principal: PrincipalId, entity: EntityId, operation: &str) -> Result<Decision> {
        let subjects = self.principal_candidates(principal)?;
        let targets = self.entity_candidates(entity)?;
        let operations = self.operation_candidates(operation)?;
        let decision = self.decide(&subjects, &targets, &operations);
        trace!(%principal, %entity, operation, reason = ?decision.reason, "resolved permission");
        Ok(decision)
    }

    /// Whether `principal` may perform `operation` with no particular entity.
    ///
    /// Only rules on `Everything` take part.
    pub fn is_allowed_everywhere(&self, principal: PrincipalId, operation: &str) -> Result<bool> {
        let subjects = self.principal_candidates(principal)?;
        let targets = BTreeMap::from([(Target::Everything, Match::Everything)]);
        let operations = self.operation_candidates(operation)?;
        Ok(self.decide(&subjects, &targets, &operations).allowed)
    }

    /// Every rule whose subject is `principal` or one of its groups,
    /// directly or through an ancestor group.
    pub fn permissions_for(&self, principal: PrincipalId) -> Result<Vec<&'a Permission>> {
        let subjects = self.principal_candidates(principal)?;
        Ok(self.collect(&subjects, |_| true))
    }

    /// Rules for `principal` that target `entity`, its groups or everything.
    pub fn permissions_for_entity(&self, principal: PrincipalId, entity: EntityId) -> Result<Vec<&'a Permission>> {
        let subjects = self.principal_candidates(principal)?;
        let targets = self.entity_candidates(entity)?;
        Ok(self.collect(&subjects, |p| targets.contains_key(&p.target)))
    }

    /// Rules for `principal` on `operation` or any of its ancestors.
    pub fn permissions_for_operation(&self, principal: PrincipalId, operation: &str) -> Result<Vec<&'a Permission>> {
        let subjects = self.principal_candidates(principal)?;
        let operations = self.operation_candidates(operation)?;
        Ok(self.collect(&subjects, |p| operations.contains_key(&p.operation)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Candidate expansion
    // ─────────────────────────────────────────────────────────────────────────

    /// The principal itself plus its full group ancestor closure.
    pub fn principal_candidates(&self, principal: PrincipalId) -> Result<BTreeMap<Subject, Match>> {
        self.directory.expect_principal(principal)?;
        let mut candidates = BTreeMap::from([(Subject::Principal(principal), Match::Exact)]);
        let direct = self.principal_memberships.groups_of(principal);
        for (group, distance) in group_distances(self.principal_groups, direct) {
            candidates.insert(Subject::Group(group), Match::Inherited { distance });
        }
        Ok(candidates)
    }

    /// The entity itself, its groups' closure, and the wildcard.
    pub fn entity_candidates(&self, entity: EntityId) -> Result<BTreeMap<Target, Match>> {
        self.directory.expect_entity(entity)?;
        let mut candidates = BTreeMap::from([
            (Target::Entity(entity), Match::Exact),
            (Target::Everything, Match::Everything),
        ]);
        let direct = self.entity_memberships.groups_of(entity);
        for (group, distance) in group_distances(self.entity_groups, direct) {
            candidates.insert(Target::Group(group), Match::Inherited { distance });
        }
        Ok(candidates)
    }

    /// The operation and each of its existing ancestors.
    ///
    /// The path itself need not exist; a rule on an existing prefix still
    /// governs it.
    pub fn operation_candidates(&self, path: &str) -> Result<BTreeMap<OperationId, Match>> {
        let prefixes = path_prefixes(path)?;
        let mut candidates = BTreeMap::new();
        for (distance, prefix) in prefixes.iter().rev().enumerate() {
            let Some(operation) = self.operations.get_by_name(prefix) else {
                continue;
            };
            let matched = match distance {
                0 => Match::Exact,
                d => Match::Inherited { distance: d as u32 },
            };
            candidates.insert(operation.id, matched);
        }
        Ok(candidates)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ranking
    // ─────────────────────────────────────────────────────────────────────────

    fn decide(
        &self,
        subjects: &BTreeMap<Subject, Match>,
        targets: &BTreeMap<Target, Match>,
        operations: &BTreeMap<OperationId, Match>,
    ) -> Decision {
        let subject_set: BTreeSet<Subject> = subjects.keys().copied().collect();
        let target_set: BTreeSet<Target> = targets.keys().copied().collect();
        let operation_set: BTreeSet<OperationId> = operations.keys().copied().collect();

        let ranked: Vec<(&Permission, Specificity)> = self
            .permissions
            .query(&subject_set, &target_set, &operation_set)
            .into_iter()
            .filter_map(|p| {
                Some((
                    p,
                    Specificity {
                        principal: *subjects.get(&p.subject)?,
                        entity: *targets.get(&p.target)?,
                        operation: *operations.get(&p.operation)?,
                    },
                ))
            })
            .collect();

        let Some(best) = ranked.iter().map(|(_, s)| *s).max() else {
            return Decision::no_match();
        };
        let maximal: Vec<&Permission> = ranked
            .iter()
            .filter(|(_, s)| *s == best)
            .map(|(p, _)| *p)
            .collect();

        let mut decision = arbitrate(&maximal);
        decision.specificity = Some(best);
        decision
    }

    fn collect(
        &self,
        subjects: &BTreeMap<Subject, Match>,
        keep: impl Fn(&Permission) -> bool,
    ) -> Vec<&'a Permission> {
        let permissions = self.permissions;
        let mut found: Vec<&'a Permission> = subjects
            .keys()
            .flat_map(|s| permissions.by_subject(*s))
            .filter(|p| keep(*p))
            .collect();
        found.sort_by_key(|p| p.id);
        found
    }
}

/// Allow or deny among rules of equal specificity.
///
/// Rules sharing one subject and target: any deny wins. Rules spread over
/// several subjects or targets: the highest level wins, and a tie at that
/// level is a deny if any of the tied rules denies.
fn arbitrate(maximal: &[&Permission]) -> Decision {
    let attachments: BTreeSet<(Subject, Target)> = maximal.iter().map(|p| p.attachment()).collect();

    let contenders: Vec<&Permission> = if attachments.len() > 1 {
        let top = maximal.iter().map(|p| p.level).max().unwrap_or_default();
        maximal.iter().copied().filter(|p| p.level == top).collect()
    } else {
        maximal.to_vec()
    };

    let denying: Vec<PermissionId> = contenders
        .iter()
        .filter(|p| p.effect == Effect::Deny)
        .map(|p| p.id)
        .collect();

    if denying.is_empty() {
        Decision {
            allowed: true,
            reason: Reason::Allowed,
            deciding: contenders.iter().map(|p| p.id).collect(),
            specificity: None,
        }
    } else {
        Decision {
            allowed: false,
            reason: Reason::Denied,
            deciding: denying,
            specificity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::GroupId;

    fn rule(id: u64, subject: Subject, effect: Effect, level: i32) -> Permission {
        Permission {
            id: PermissionId::new(id),
            subject,
            target: Target::Everything,
            operation: OperationId::new(1),
            effect,
            level,
        }
    }

    #[test]
    fn test_match_ordering() {
        assert!(Match::Exact > Match::Inherited { distance: 0 });
        assert!(Match::Inherited { distance: 0 } > Match::Inherited { distance: 3 });
        assert!(Match::Inherited { distance: 9 } > Match::Everything);
    }

    #[test]
    fn test_specificity_is_lexicographic() {
        let principal_exact = Specificity {
            principal: Match::Exact,
            entity: Match::Everything,
            operation: Match::Inherited { distance: 2 },
        };
        let group_everything_exact = Specificity {
            principal: Match::Inherited { distance: 0 },
            entity: Match::Exact,
            operation: Match::Exact,
        };
        assert!(principal_exact > group_everything_exact);
    }

    #[test]
    fn test_same_attachment_deny_wins_regardless_of_level() {
        let who = Subject::Principal(PrincipalId::new(1));
        let allow = rule(1, who, Effect::Allow, 10);
        let deny = rule(2, who, Effect::Deny, 1);
        let decision = arbitrate(&[&allow, &deny]);
        assert_eq!(decision.reason, Reason::Denied);
        assert_eq!(decision.deciding, vec![PermissionId::new(2)]);
    }

    #[test]
    fn test_level_breaks_tie_between_groups() {
        let allow = rule(1, Subject::Group(GroupId::new(1)), Effect::Allow, 5);
        let deny = rule(2, Subject::Group(GroupId::new(2)), Effect::Deny, 1);
        assert!(arbitrate(&[&allow, &deny]).allowed);

        let deny = rule(2, Subject::Group(GroupId::new(2)), Effect::Deny, 5);
        assert!(!arbitrate(&[&allow, &deny]).allowed);
    }
}
