//! Test fixtures and helpers.
//!
//! Common setup code for integration tests and benchmarks.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use warden::{UnitOfWork, Warden};
use warden_core::{EntityId, PermissionId, PrincipalId};
use warden_perms::{Authorization, Effect, PermissionRequest, PermsError, Subject, Target};
use warden_store::Store;

use crate::scenarios::GrantSpec;

/// The standard scenario most tests start from.
///
/// - `Ayende` is in `DBA` (child of `Administrators`) and in `Auditors`
/// - `Oren` is in no group
/// - `account/1` is in `Important Accounts`; `account/2` is in no group
/// - operations `/Account`, `/Account/Edit` and `/Account/Delete` exist
///
/// No rules are granted.
#[derive(Debug, Clone)]
pub struct StandardFixture {
    pub auth: Authorization,
    pub ayende: PrincipalId,
    pub oren: PrincipalId,
    pub account: EntityId,
    pub other_account: EntityId,
    principals: HashMap<String, PrincipalId>,
    entities: HashMap<String, EntityId>,
}

impl StandardFixture {
    pub fn new() -> Self {
        Self::build().expect("standard fixture is consistent")
    }

    fn build() -> Result<Self, PermsError> {
        let mut auth = Authorization::new();
        let ayende = auth.register_principal("Ayende");
        let oren = auth.register_principal("Oren");
        let account = auth.register_entity("account/1", None)?;
        let other_account = auth.register_entity("account/2", None)?;

        auth.create_principal_group("Administrators", None)?;
        auth.create_child_group_of("Administrators", "DBA")?;
        auth.create_principal_group("Auditors", None)?;
        auth.associate_principal_with_group(ayende, "DBA")?;
        auth.associate_principal_with_group(ayende, "Auditors")?;

        auth.create_entity_group("Important Accounts")?;
        auth.associate_entity_with_group(account, "Important Accounts")?;

        auth.create_operation("/Account/Edit")?;
        auth.create_operation("/Account/Delete")?;
        auth.discard_changes();

        Ok(Self {
            auth,
            ayende,
            oren,
            account,
            other_account,
            principals: HashMap::from([("Ayende".into(), ayende), ("Oren".into(), oren)]),
            entities: HashMap::from([
                ("account/1".into(), account),
                ("account/2".into(), other_account),
            ]),
        })
    }

    pub fn principal(&self, name: &str) -> Option<PrincipalId> {
        self.principals.get(name).copied()
    }

    pub fn entity(&self, name: &str) -> Option<EntityId> {
        self.entities.get(name).copied()
    }

    /// Grant a rule described by name.
    ///
    /// Subjects are `principal:<name>` or `group:<name>`; targets are
    /// `entity:<name>`, `group:<name>` or `everything`.
    pub fn grant(&mut self, spec: &GrantSpec) -> Result<PermissionId, PermsError> {
        let subject = self.subject(&spec.subject)?;
        let target = self.target(&spec.target)?;
        self.auth.grant_permission(PermissionRequest {
            subject,
            target,
            operation: spec.operation.clone(),
            effect: spec.effect,
            level: spec.level,
        })
    }

    fn subject(&self, text: &str) -> Result<Subject, PermsError> {
        match text.split_once(':') {
            Some(("principal", name)) => self
                .principal(name)
                .map(Subject::Principal)
                .ok_or_else(|| unknown("principal", name)),
            Some(("group", name)) => Ok(Subject::Group(self.auth.principal_groups().lookup(name)?)),
            _ => Err(PermsError::InvalidRecord(format!("bad subject: {text}"))),
        }
    }

    fn target(&self, text: &str) -> Result<Target, PermsError> {
        match text.split_once(':') {
            None if text == "everything" => Ok(Target::Everything),
            Some(("entity", name)) => self
                .entity(name)
                .map(Target::Entity)
                .ok_or_else(|| unknown("entity", name)),
            Some(("group", name)) => Ok(Target::Group(self.auth.entity_groups().lookup(name)?)),
            _ => Err(PermsError::InvalidRecord(format!("bad target: {text}"))),
        }
    }
}

impl Default for StandardFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown(what: &str, name: &str) -> PermsError {
    PermsError::InvalidRecord(format!("unknown {what}: {name}"))
}

/// Seed an open [`Warden`] with the standard scenario's structure and
/// commit it. Returns `(ayende, account)`.
pub async fn seed_warden<S: Store>(warden: &mut Warden<S>) -> warden::Result<(PrincipalId, EntityId)> {
    let mut uow = warden.begin_unit_of_work();
    let ids = seed_structure(&mut uow)?;
    uow.commit().await?;
    Ok(ids)
}

fn seed_structure<S: Store>(uow: &mut UnitOfWork<'_, S>) -> warden::Result<(PrincipalId, EntityId)> {
    let ayende = uow.register_principal("Ayende");
    let account = uow.register_entity("account/1", None)?;
    uow.create_principal_group("Administrators", None)?;
    uow.create_child_group_of("Administrators", "DBA")?;
    uow.associate_principal_with_group(ayende, "DBA")?;
    uow.create_entity_group("Important Accounts")?;
    uow.associate_entity_with_group(account, "Important Accounts")?;
    uow.create_operation("/Account/Edit")?;
    uow.create_operation("/Account/Delete")?;
    Ok((ayende, account))
}

// ─────────────────────────────────────────────────────────────────────────────
// Large randomized fixtures
// ─────────────────────────────────────────────────────────────────────────────

/// A larger engine for benchmarks and soak tests.
#[derive(Debug, Clone)]
pub struct WideFixture {
    pub auth: Authorization,
    pub principals: Vec<PrincipalId>,
    pub entities: Vec<EntityId>,
    /// Leaf operation paths.
    pub operations: Vec<String>,
}

/// Build a [`WideFixture`]: a principal-group chain `depth` deep, ten flat
/// entity groups, `principals` principals and entities, and a few rules per
/// group. The same `seed` always builds the same engine.
pub fn wide_fixture(depth: usize, principals: usize, seed: u64) -> WideFixture {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut auth = Authorization::new();

    let groups: Vec<String> = (0..depth.max(1)).map(|i| format!("level-{i}")).collect();
    for (i, name) in groups.iter().enumerate() {
        let parent = i.checked_sub(1).map(|p| groups[p].as_str());
        auth.create_principal_group(name, parent)
            .expect("group names are unique");
    }
    let entity_groups: Vec<String> = (0..10).map(|i| format!("bucket-{i}")).collect();
    for name in &entity_groups {
        auth.create_entity_group(name).expect("group names are unique");
    }

    let mut operations = Vec::new();
    for area in ["Account", "Invoice", "Report"] {
        for verb in ["View", "Edit", "Delete", "Export"] {
            let path = format!("/{area}/{verb}");
            auth.create_operation(&path).expect("paths are valid");
            operations.push(path);
        }
    }

    let principal_ids: Vec<PrincipalId> = (0..principals)
        .map(|i| {
            let id = auth.register_principal(&format!("user-{i}"));
            let group = &groups[rng.gen_range(0..groups.len())];
            auth.associate_principal_with_group(id, group)
                .expect("group exists");
            id
        })
        .collect();
    let entity_ids: Vec<EntityId> = (0..principals)
        .map(|i| {
            let id = auth
                .register_entity(&format!("entity-{i}"), None)
                .expect("untyped entities always register");
            let group = &entity_groups[rng.gen_range(0..entity_groups.len())];
            auth.associate_entity_with_group(id, group).expect("group exists");
            id
        })
        .collect();

    for group in &groups {
        for _ in 0..3 {
            let operation = &operations[rng.gen_range(0..operations.len())];
            let choices = if entity_ids.is_empty() { 2 } else { 3 };
            let target = match rng.gen_range(0..choices) {
                0 => Target::Everything,
                1 => {
                    let bucket = &entity_groups[rng.gen_range(0..entity_groups.len())];
                    Target::Group(auth.entity_groups().lookup(bucket).expect("group exists"))
                }
                _ => Target::Entity(entity_ids[rng.gen_range(0..entity_ids.len())]),
            };
            let effect = if rng.gen_bool(0.7) { Effect::Allow } else { Effect::Deny };
            let subject = Subject::Group(auth.principal_groups().lookup(group).expect("group exists"));
            auth.grant_permission(PermissionRequest {
                subject,
                target,
                operation: operation.clone(),
                effect,
                level: Some(rng.gen_range(0..5)),
            })
            .expect("rule references exist");
        }
    }
    auth.discard_changes();

    WideFixture {
        auth,
        principals: principal_ids,
        entities: entity_ids,
        operations,
    }
}
