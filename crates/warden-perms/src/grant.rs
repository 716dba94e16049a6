//! Fluent permission builder.
//!
//! ```rust,no_run
//! # use warden_perms::Authorization;
//! # fn example(auth: &mut Authorization, ayende: warden_core::PrincipalId) -> warden_perms::Result<()> {
//! auth.allow("/Account/Edit")
//!     .for_principal(ayende)
//!     .on_group("Important Accounts")
//!     .level(10)
//!     .save()?;
//!
//! auth.deny("/Account/Delete")
//!     .for_group("Guests")
//!     .on_everything()
//!     .save()?;
//! # Ok(())
//! # }
//! ```
//!
//! Group names are resolved when the grant is saved, so a builder can be
//! assembled before the groups it names exist.

use warden_core::{EntityId, PermissionId, PrincipalId};

use crate::editing::Authorization;
use crate::error::{PermsError, Result};
use crate::permission::{Effect, PermissionRequest, Subject, Target};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SubjectSpec {
    Principal(PrincipalId),
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetSpec {
    Entity(EntityId),
    Group(String),
    Everything,
}

/// A grant under construction. Nothing is stored until [`GrantBuilder::save`].
#[must_use = "a grant is only stored once `save` is called"]
#[derive(Debug)]
pub struct GrantBuilder<'a> {
    engine: &'a mut Authorization,
    operation: String,
    effect: Effect,
    subject: Option<SubjectSpec>,
    target: Option<TargetSpec>,
    level: Option<i32>,
}

impl<'a> GrantBuilder<'a> {
    pub(crate) fn new(engine: &'a mut Authorization, operation: &str, effect: Effect) -> Self {
        Self {
            engine,
            operation: operation.to_string(),
            effect,
            subject: None,
            target: None,
            level: None,
        }
    }

    pub fn for_principal(mut self, principal: PrincipalId) -> Self {
        self.subject = Some(SubjectSpec::Principal(principal));
        self
    }

    /// Apply to every member of the named principal group.
    pub fn for_group(mut self, group: &str) -> Self {
        self.subject = Some(SubjectSpec::Group(group.to_string()));
        self
    }

    pub fn on(mut self, entity: EntityId) -> Self {
        self.target = Some(TargetSpec::Entity(entity));
        self
    }

    /// Apply to every entity in the named entity group.
    pub fn on_group(mut self, group: &str) -> Self {
        self.target = Some(TargetSpec::Group(group.to_string()));
        self
    }

    pub fn on_everything(mut self) -> Self {
        self.target = Some(TargetSpec::Everything);
        self
    }

    pub fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    /// Use the engine's default level. This is also what happens when no
    /// level is set.
    pub fn default_level(mut self) -> Self {
        self.level = None;
        self
    }

    /// Resolve names and store the rule.
    pub fn save(self) -> Result<PermissionId> {
        let subject = match self.subject.ok_or(PermsError::IncompleteGrant("subject"))? {
            SubjectSpec::Principal(id) => Subject::Principal(id),
            SubjectSpec::Group(name) => Subject::Group(self.engine.principal_groups().lookup(&name)?),
        };
        let target = match self.target.ok_or(PermsError::IncompleteGrant("target"))? {
            TargetSpec::Entity(id) => Target::Entity(id),
            TargetSpec::Group(name) => Target::Group(self.engine.entity_groups().lookup(&name)?),
            TargetSpec::Everything => Target::Everything,
        };

        self.engine.grant_permission(PermissionRequest {
            subject,
            target,
            operation: self.operation,
            effect: self.effect,
            level: self.level,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Authorization, PermsError, DEFAULT_LEVEL};

    #[test]
    fn test_missing_target_is_incomplete() {
        let mut auth = Authorization::new();
        let ayende = auth.register_principal("Ayende");
        auth.create_operation("/Account/Edit").unwrap();

        let err = auth
            .allow("/Account/Edit")
            .for_principal(ayende)
            .save()
            .unwrap_err();
        assert_eq!(err, PermsError::IncompleteGrant("target"));
        assert!(auth.permissions().is_empty());
    }

    #[test]
    fn test_missing_subject_is_incomplete() {
        let mut auth = Authorization::new();
        let err = auth.deny("/Account/Edit").on_everything().save().unwrap_err();
        assert_eq!(err, PermsError::IncompleteGrant("subject"));
    }

    #[test]
    fn test_levels() {
        let mut auth = Authorization::with_default_level(3);
        let ayende = auth.register_principal("Ayende");
        auth.create_operation("/Account/Edit").unwrap();

        let explicit = auth
            .allow("/Account/Edit")
            .for_principal(ayende)
            .on_everything()
            .level(10)
            .save()
            .unwrap();
        let defaulted = auth
            .allow("/Account/Edit")
            .for_principal(ayende)
            .on_everything()
            .level(10)
            .default_level()
            .save()
            .unwrap();

        assert_eq!(auth.permission(explicit).unwrap().level, 10);
        assert_eq!(auth.permission(defaulted).unwrap().level, 3);
        assert_ne!(auth.default_level(), DEFAULT_LEVEL);
    }

    #[test]
    fn test_unknown_operation_is_not_found() {
        let mut auth = Authorization::new();
        let ayende = auth.register_principal("Ayende");
        let err = auth
            .allow("/Account/Edit")
            .for_principal(ayende)
            .on_everything()
            .save()
            .unwrap_err();
        assert_eq!(err.to_string(), "operation not found: /Account/Edit");
    }
}
