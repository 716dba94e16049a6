//! Error types for Warden core structures.

use std::fmt;

use thiserror::Error;

/// A uniqueness namespace. Each one has its own name index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    PrincipalGroup,
    EntityGroup,
    Operation,
    EntityType,
}

impl Namespace {
    /// Human-readable label, also used as the `what` of `NotFound`.
    pub const fn label(self) -> &'static str {
        match self {
            Namespace::PrincipalGroup => "principal group",
            Namespace::EntityGroup => "entity group",
            Namespace::Operation => "operation",
            Namespace::EntityType => "entity type",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised by structural edits and lookups.
///
/// Every variant is raised before any mutation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A name is already taken in its namespace.
    #[error("{namespace} '{name}' already exists")]
    DuplicateName { namespace: Namespace, name: String },

    /// A referenced record does not exist.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// Removal refused because direct children still exist.
    #[error("cannot remove {namespace} '{name}' because it has children; remove those first")]
    HasChildren { namespace: Namespace, name: String },

    /// Malformed operation path.
    #[error("invalid operation path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Persisted parent links loop back on themselves.
    #[error("{namespace} '{name}' is its own ancestor")]
    Cycle { namespace: Namespace, name: String },

    /// Removal refused because other records still reference this one.
    #[error("{what} '{name}' is still in use")]
    InUse { what: &'static str, name: String },

    /// Two persisted records claim the same id.
    #[error("duplicate {what} id {id}")]
    DuplicateId { what: &'static str, id: String },

    /// A persisted id or id counter is outside the usable range.
    #[error("{what} id {id} is out of range")]
    IdOutOfRange { what: &'static str, id: u64 },
}

impl CoreError {
    pub fn not_found(what: &'static str, key: impl fmt::Display) -> Self {
        CoreError::NotFound {
            what,
            key: key.to_string(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
