//! Unified error type for the Warden API.

use thiserror::Error;
use warden_perms::PermsError;
use warden_store::StoreError;

/// Top-level error for Warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The stored records do not form a valid engine.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl From<warden_core::CoreError> for WardenError {
    fn from(e: warden_core::CoreError) -> Self {
        WardenError::Permission(PermsError::Core(e))
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
