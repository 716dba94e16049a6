//! Registration of principals, securable entities and entity types.
//!
//! The engine does not own host-application objects; it keeps a thin record
//! per principal and per entity so that memberships and permission rules
//! can reference them by id, and so that `NotFound` can be raised for
//! unknown ones.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::error::{CoreError, Namespace, Result};
use crate::names::NamedIndex;
use crate::types::{EntityId, EntityTypeId, PrincipalId, SecurityKey};

/// An actor that can be granted or denied access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
}

/// A securable object instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Assigned at registration and never changed.
    pub security_key: SecurityKey,
    pub entity_type: Option<EntityTypeId>,
}

/// A domain type whose instances are secured.
///
/// The name is the type's full name, without any version qualifier, so
/// upgrading the host application does not orphan existing records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub id: EntityTypeId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Directory {
    principals: Arena<PrincipalId, Principal>,
    entities: Arena<EntityId, Entity>,
    by_security_key: HashMap<SecurityKey, EntityId>,
    entity_types: BTreeMap<EntityTypeId, EntityType>,
    type_names: NamedIndex<EntityTypeId>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            principals: Arena::new(),
            entities: Arena::new(),
            by_security_key: HashMap::new(),
            entity_types: BTreeMap::new(),
            type_names: NamedIndex::new(Namespace::EntityType),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principals
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_principal(&mut self, name: &str) -> PrincipalId {
        self.principals.insert_with(|id| Principal {
            id,
            name: name.to_string(),
        })
    }

    pub fn principal(&self, id: PrincipalId) -> Option<&Principal> {
        self.principals.get(id)
    }

    pub fn expect_principal(&self, id: PrincipalId) -> Result<&Principal> {
        self.principals
            .get(id)
            .ok_or_else(|| CoreError::not_found("principal", id))
    }

    pub fn remove_principal(&mut self, id: PrincipalId) -> Result<Principal> {
        self.principals
            .remove(id)
            .ok_or_else(|| CoreError::not_found("principal", id))
    }

    pub fn principals(&self) -> impl Iterator<Item = &Principal> + '_ {
        self.principals.iter().map(|(_, p)| p)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entities
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an entity, optionally tagged with a registered type.
    pub fn add_entity(&mut self, name: &str, entity_type: Option<&str>) -> Result<EntityId> {
        let type_id = entity_type
            .map(|t| self.type_names.lookup(t))
            .transpose()?;
        let mut security_key = SecurityKey::generate();
        while self.by_security_key.contains_key(&security_key) {
            security_key = SecurityKey::generate();
        }

        let id = self.entities.insert_with(|id| Entity {
            id,
            name: name.to_string(),
            security_key,
            entity_type: type_id,
        });
        self.by_security_key.insert(security_key, id);
        Ok(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn expect_entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| CoreError::not_found("entity", id))
    }

    pub fn entity_by_security_key(&self, key: &SecurityKey) -> Option<&Entity> {
        self.by_security_key
            .get(key)
            .and_then(|id| self.entities.get(*id))
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        let entity = self
            .entities
            .remove(id)
            .ok_or_else(|| CoreError::not_found("entity", id))?;
        self.by_security_key.remove(&entity.security_key);
        Ok(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter().map(|(_, e)| e)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity types
    // ─────────────────────────────────────────────────────────────────────────

    pub fn register_entity_type(&mut self, name: &str) -> Result<EntityTypeId> {
        let id = EntityTypeId::derive(name);
        self.type_names.insert(name, id)?;
        self.entity_types.insert(
            id,
            EntityType {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    pub fn entity_type(&self, id: EntityTypeId) -> Option<&EntityType> {
        self.entity_types.get(&id)
    }

    pub fn entity_type_by_name(&self, name: &str) -> Option<&EntityType> {
        self.type_names
            .get(name)
            .and_then(|id| self.entity_types.get(&id))
    }

    /// Remove a type. Refused while any entity still carries it.
    pub fn remove_entity_type(&mut self, name: &str) -> Result<EntityType> {
        let id = self.type_names.lookup(name)?;
        if self.entities().any(|e| e.entity_type == Some(id)) {
            return Err(CoreError::InUse {
                what: "entity type",
                name: name.to_string(),
            });
        }
        self.type_names.remove(name);
        self.entity_types
            .remove(&id)
            .ok_or_else(|| CoreError::not_found("entity type", name))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> + '_ {
        self.entity_types.values()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Restoring persisted records
    // ─────────────────────────────────────────────────────────────────────────

    pub fn restore_principal(&mut self, principal: Principal) -> Result<()> {
        self.principals.restore("principal", principal.id, principal)
    }

    pub fn restore_entity(&mut self, entity: Entity) -> Result<()> {
        if let Some(type_id) = entity.entity_type {
            if !self.entity_types.contains_key(&type_id) {
                return Err(CoreError::not_found("entity type", type_id));
            }
        }
        if self.by_security_key.contains_key(&entity.security_key) {
            return Err(CoreError::DuplicateId {
                what: "security key",
                id: entity.security_key.to_string(),
            });
        }
        let (id, key) = (entity.id, entity.security_key);
        self.entities.restore("entity", id, entity)?;
        self.by_security_key.insert(key, id);
        Ok(())
    }

    pub fn restore_entity_type(&mut self, entity_type: EntityType) -> Result<()> {
        if self.entity_types.contains_key(&entity_type.id) {
            return Err(CoreError::DuplicateId {
                what: "entity type",
                id: entity_type.id.to_string(),
            });
        }
        self.type_names.insert(&entity_type.name, entity_type.id)?;
        self.entity_types.insert(entity_type.id, entity_type);
        Ok(())
    }

    pub fn next_principal_id(&self) -> PrincipalId {
        self.principals.next_id()
    }

    pub fn next_entity_id(&self) -> EntityId {
        self.entities.next_id()
    }

    pub fn advance_principals_to(&mut self, next: u64) -> Result<()> {
        self.principals.advance_to("principal", next)
    }

    pub fn advance_entities_to(&mut self, next: u64) -> Result<()> {
        self.entities.advance_to("entity", next)
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_gets_stable_security_key() {
        let mut dir = Directory::new();
        let account = dir.add_entity("ayende", None).unwrap();

        let entity = dir.entity(account).unwrap();
        assert_ne!(entity.security_key, SecurityKey::NIL);
        let by_key = dir.entity_by_security_key(&entity.security_key).unwrap();
        assert_eq!(by_key.id, account);
    }

    #[test]
    fn test_entity_with_unknown_type_fails() {
        let mut dir = Directory::new();
        let err = dir.add_entity("ayende", Some("Acme.Account")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_entity_type_registration() {
        let mut dir = Directory::new();
        let id = dir.register_entity_type("Acme.Account").unwrap();
        assert_eq!(id, EntityTypeId::derive("Acme.Account"));
        assert!(matches!(
            dir.register_entity_type("Acme.Account").unwrap_err(),
            CoreError::DuplicateName { .. }
        ));

        let account = dir.add_entity("ayende", Some("Acme.Account")).unwrap();
        assert!(matches!(
            dir.remove_entity_type("Acme.Account").unwrap_err(),
            CoreError::InUse { .. }
        ));

        dir.remove_entity(account).unwrap();
        dir.remove_entity_type("Acme.Account").unwrap();
        assert!(dir.entity_type_by_name("Acme.Account").is_none());
    }

    #[test]
    fn test_restore_rejects_reused_ids_and_keys() {
        let mut dir = Directory::new();
        let alice = Principal {
            id: PrincipalId::new(2),
            name: "alice".into(),
        };
        dir.restore_principal(alice.clone()).unwrap();
        let err = dir
            .restore_principal(Principal {
                name: "bob".into(),
                ..alice
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { .. }));
        assert_eq!(dir.principal(PrincipalId::new(2)).unwrap().name, "alice");

        let account = Entity {
            id: EntityId::new(1),
            name: "ayende".into(),
            security_key: SecurityKey::generate(),
            entity_type: None,
        };
        dir.restore_entity(account.clone()).unwrap();
        let same_key = Entity {
            id: EntityId::new(2),
            ..account.clone()
        };
        assert!(dir.restore_entity(same_key).is_err());
        let same_id = Entity {
            security_key: SecurityKey::generate(),
            ..account
        };
        assert!(dir.restore_entity(same_id.clone()).is_err());
        assert!(dir.entity_by_security_key(&same_id.security_key).is_none());
        assert_eq!(dir.next_entity_id(), EntityId::new(2));
    }

    #[test]
    fn test_remove_unknown_principal() {
        let mut dir = Directory::new();
        let err = dir.remove_principal(PrincipalId::new(9)).unwrap_err();
        assert_eq!(err.to_string(), "principal not found: principal#9");
    }
}
