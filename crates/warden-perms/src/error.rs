//! Error types for the permissions module.

use thiserror::Error;
use warden_core::PermissionId;

/// Errors that can occur during permission operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermsError {
    /// Structural error from the hierarchies or the directory.
    #[error(transparent)]
    Core(#[from] warden_core::CoreError),

    /// Permission not found.
    #[error("permission not found: {0}")]
    PermissionNotFound(PermissionId),

    /// A grant request was saved without a required part.
    #[error("incomplete grant: missing {0}")]
    IncompleteGrant(&'static str),

    /// Persisted records do not describe a consistent engine.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
