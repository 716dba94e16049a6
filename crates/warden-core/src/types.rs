//! Strong type definitions for Warden.
//!
//! All identifiers are newtypes to prevent misuse at compile time. Record
//! identifiers are plain integers handed out by the owning table; keys that
//! must stay stable across processes (security keys, entity type ids) are
//! fixed-size byte strings rendered as hex.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create an identifier from its raw value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

record_id!(
    /// Identifier of a registered principal (user).
    PrincipalId,
    "principal"
);

record_id!(
    /// Identifier of a registered securable entity.
    EntityId,
    "entity"
);

record_id!(
    /// Identifier of a group. Principal groups and entity groups live in
    /// separate tables, so a `GroupId` is only meaningful together with
    /// its [`GroupKind`](crate::group::GroupKind).
    GroupId,
    "group"
);

record_id!(
    /// Identifier of an operation.
    OperationId,
    "operation"
);

record_id!(
    /// Identifier of a permission rule.
    PermissionId,
    "permission"
);

/// A 16-byte opaque security key.
///
/// Generated once when an entity is registered and never changed. It lets
/// the engine refer to heterogeneous host objects uniformly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecurityKey(pub [u8; 16]);

impl SecurityKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// The nil key. Never produced by [`SecurityKey::generate`] in practice.
    pub const NIL: Self = Self([0u8; 16]);
}

impl fmt::Debug for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityKey({})", self.to_hex())
    }
}

impl fmt::Display for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A 16-byte entity type identifier.
///
/// Derived from Blake3(domain || type_name), so the same type name maps to
/// the same id in every process and every store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityTypeId(pub [u8; 16]);

impl EntityTypeId {
    /// Derive the id for a type name.
    pub fn derive(type_name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"warden-entity-type-v0:");
        hasher.update(type_name.as_bytes());
        let mut out = [0u8; 16];
        out.copy_from_slice(&hasher.finalize().as_bytes()[..16]);
        Self(out)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityTypeId({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..8])
    }
}
