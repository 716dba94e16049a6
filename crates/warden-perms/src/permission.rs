//! Permission rules.
//!
//! A rule says that a subject may (or may not) perform an operation on a
//! target. Subjects and targets are closed tagged variants so the resolver
//! can match every case exhaustively.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::{EntityId, GroupId, OperationId, PermissionId, PrincipalId};

/// Baseline level for rules saved without an explicit one.
pub const DEFAULT_LEVEL: i32 = 1;

/// Who a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subject {
    /// A single principal.
    Principal(PrincipalId),
    /// Every principal in a principal group, directly or through a child group.
    Group(GroupId),
}

/// What a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    /// A single entity.
    Entity(EntityId),
    /// Every entity in an entity group.
    Group(GroupId),
    /// Every entity, and checks that name no entity at all.
    Everything,
}

/// Whether a rule grants or refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn is_allow(self) -> bool {
        matches!(self, Effect::Allow)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("allow"),
            Effect::Deny => f.write_str("deny"),
        }
    }
}

/// A stored permission rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub subject: Subject,
    pub target: Target,
    pub operation: OperationId,
    pub effect: Effect,
    /// Only consulted when rules on different subjects or targets tie on
    /// specificity. Higher wins.
    pub level: i32,
}

impl Permission {
    pub fn is_allow(&self) -> bool {
        self.effect.is_allow()
    }

    /// The (subject, target) pair this rule is attached to.
    pub fn attachment(&self) -> (Subject, Target) {
        (self.subject, self.target)
    }
}

/// Everything needed to create a rule, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub subject: Subject,
    pub target: Target,
    /// Full operation path.
    pub operation: String,
    pub effect: Effect,
    /// `None` takes the engine's default level.
    pub level: Option<i32>,
}
