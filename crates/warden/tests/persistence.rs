//! Commit, reload and rollback behaviour of the Warden facade.

use anyhow::Result;
use warden::perms::{GroupRecord, Record};
use warden::store::{MemoryStore, SqliteStore, Store, StoreError};
use warden::{EntityId, GroupId, PrincipalId, Warden, WardenConfig, WardenError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

struct Seeded {
    ayende: PrincipalId,
    account: EntityId,
}

/// Ayende in DBA under Administrators, an account in Important Accounts,
/// Administrators allowed on everything and DBA denied on Important
/// Accounts.
async fn seed<S: Store>(warden: &mut Warden<S>) -> Result<Seeded> {
    let mut uow = warden.begin_unit_of_work();
    let ayende = uow.register_principal("Ayende");
    let account = uow.register_entity("account/1", None)?;

    uow.create_principal_group("Administrators", None)?;
    uow.create_child_group_of("Administrators", "DBA")?;
    uow.associate_principal_with_group(ayende, "DBA")?;
    uow.create_entity_group("Important Accounts")?;
    uow.associate_entity_with_group(account, "Important Accounts")?;

    uow.create_operation("/Account/Edit")?;
    uow.allow("/Account")
        .for_group("Administrators")
        .on_everything()
        .save()?;
    uow.deny("/Account/Edit")
        .for_group("DBA")
        .on_group("Important Accounts")
        .save()?;
    uow.commit().await?;

    Ok(Seeded { ayende, account })
}

#[tokio::test]
async fn test_commit_and_reload_memory() -> Result<()> {
    init_tracing();
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;
    let seeded = seed(&mut warden).await?;

    assert!(!warden.is_allowed(seeded.ayende, seeded.account, "/Account/Edit")?);
    assert!(warden.is_allowed_everywhere(seeded.ayende, "/Account/Edit")?);

    let before = warden.engine().records();
    warden.reload().await?;
    assert_eq!(warden.engine().records(), before);
    assert!(!warden.is_allowed(seeded.ayende, seeded.account, "/Account/Edit")?);
    assert!(!warden.engine().has_changes());
    Ok(())
}

#[tokio::test]
async fn test_commit_survives_sqlite_reopen() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("warden.db");

    let (seeded, before) = {
        let mut warden = Warden::open(SqliteStore::open(&path)?, WardenConfig::default()).await?;
        let seeded = seed(&mut warden).await?;
        (seeded, warden.engine().records())
    };

    let warden = Warden::open(SqliteStore::open(&path)?, WardenConfig::default()).await?;
    assert_eq!(warden.engine().records(), before);
    assert!(!warden.is_allowed(seeded.ayende, seeded.account, "/Account/Edit")?);

    let dba = warden.ancestry_association(seeded.ayende, "Administrators")?;
    let names: Vec<&str> = dba.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["DBA", "Administrators"]);
    Ok(())
}

#[tokio::test]
async fn test_ids_continue_after_reload() -> Result<()> {
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;
    let seeded = seed(&mut warden).await?;
    warden.reload().await?;

    let mut uow = warden.begin_unit_of_work();
    let oren = uow.register_principal("Oren");
    uow.commit().await?;

    assert!(oren > seeded.ayende);
    Ok(())
}

/// Register alice and bob, remove bob, reload, then register mallory.
async fn register_after_removal<S: Store>(
    warden: &mut Warden<S>,
) -> Result<(PrincipalId, PrincipalId)> {
    let mut uow = warden.begin_unit_of_work();
    uow.register_principal("alice");
    let bob = uow.register_principal("bob");
    uow.commit().await?;

    let mut uow = warden.begin_unit_of_work();
    uow.remove_principal(bob)?;
    uow.commit().await?;

    warden.reload().await?;
    let mut uow = warden.begin_unit_of_work();
    let mallory = uow.register_principal("mallory");
    uow.commit().await?;
    Ok((bob, mallory))
}

#[tokio::test]
async fn test_removed_principal_id_not_reused_after_reload() -> Result<()> {
    init_tracing();
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;
    let (bob, mallory) = register_after_removal(&mut warden).await?;

    assert_ne!(mallory, bob);
    assert!(mallory > bob);
    assert!(warden.engine().principal(bob).is_none());
    Ok(())
}

#[tokio::test]
async fn test_removed_ids_stay_spent_across_sqlite_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("warden.db");

    let (bob, mallory) = {
        let mut warden = Warden::open(SqliteStore::open(&path)?, WardenConfig::default()).await?;
        register_after_removal(&mut warden).await?
    };
    assert!(mallory > bob);

    let mut warden = Warden::open(SqliteStore::open(&path)?, WardenConfig::default()).await?;
    let mut uow = warden.begin_unit_of_work();
    let trudy = uow.register_principal("trudy");
    uow.create_operation("/Account/Edit")?;
    uow.remove_operation("/Account/Edit")?;
    uow.commit().await?;
    assert!(trudy > mallory);

    let mut warden = Warden::open(SqliteStore::open(&path)?, WardenConfig::default()).await?;
    let mut uow = warden.begin_unit_of_work();
    let delete = uow.create_operation("/Account/Delete")?;
    let parent = uow.get_operation_by_name("/Account").map(|o| o.id);
    uow.commit().await?;
    // /Account and /Account/Edit were ids 1 and 2
    assert_eq!(parent.map(|id| id.get()), Some(1));
    assert_eq!(delete.get(), 3);
    Ok(())
}

#[tokio::test]
async fn test_uncommitted_unit_of_work_changes_nothing() -> Result<()> {
    init_tracing();
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;

    {
        let mut uow = warden.begin_unit_of_work();
        uow.register_principal("Ayende");
        uow.create_principal_group("Administrators", None)?;
        assert!(uow.get_principal_group_by_name("Administrators").is_some());
    }

    assert!(warden.store().is_empty());
    assert!(warden
        .engine()
        .get_principal_group_by_name("Administrators")
        .is_none());

    let mut uow = warden.begin_unit_of_work();
    uow.create_operation("/Account")?;
    uow.rollback();
    assert!(warden.engine().get_operation_by_name("/Account").is_none());
    Ok(())
}

#[tokio::test]
async fn test_store_conflict_fails_commit() -> Result<()> {
    init_tracing();
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;

    // written behind the engine's back, so only the store knows the name
    warden
        .store()
        .create_record(&Record::PrincipalGroup(GroupRecord {
            id: GroupId::new(50),
            name: "Administrators".into(),
            parent: None,
            members: Vec::new(),
        }))
        .await?;

    let mut uow = warden.begin_unit_of_work();
    uow.create_principal_group("Administrators", None)?;
    let err = uow.commit().await.unwrap_err();

    assert!(matches!(
        err,
        WardenError::Store(StoreError::Conflict { .. })
    ));
    assert!(warden
        .engine()
        .get_principal_group_by_name("Administrators")
        .is_none());
    assert_eq!(warden.store().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_commit_writes_only_touched_records() -> Result<()> {
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;
    let seeded = seed(&mut warden).await?;

    let uow = warden.begin_unit_of_work();
    let summary = uow.commit().await?;
    assert!(summary.is_empty());

    let mut uow = warden.begin_unit_of_work();
    uow.allow("/Account/Edit")
        .for_principal(seeded.ayende)
        .on(seeded.account)
        .save()?;
    let summary = uow.commit().await?;
    // the rule and the permission id counter
    assert_eq!(summary.upserts, 2);
    assert_eq!(summary.deletes, 0);
    assert!(warden.is_allowed(seeded.ayende, seeded.account, "/Account/Edit")?);
    Ok(())
}

#[tokio::test]
async fn test_removal_cascade_is_persisted() -> Result<()> {
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;
    let seeded = seed(&mut warden).await?;

    let mut uow = warden.begin_unit_of_work();
    uow.allow("/Account/Edit")
        .for_principal(seeded.ayende)
        .on(seeded.account)
        .save()?;
    uow.commit().await?;

    let mut uow = warden.begin_unit_of_work();
    uow.remove_principal(seeded.ayende)?;
    let summary = uow.commit().await?;
    // the principal and its rule go, DBA is rewritten without the member
    assert_eq!(summary.deletes, 2);
    assert_eq!(summary.upserts, 1);

    warden.reload().await?;
    assert!(warden.engine().principal(seeded.ayende).is_none());
    assert_eq!(warden.engine().permissions().len(), 2);
    let dba = warden
        .engine()
        .get_principal_group_by_name("DBA")
        .map(|g| g.id);
    assert!(dba.is_some());
    Ok(())
}

#[tokio::test]
async fn test_unknown_principal_is_an_error() -> Result<()> {
    let mut warden = Warden::open(MemoryStore::new(), WardenConfig::default()).await?;
    let seeded = seed(&mut warden).await?;

    let result = warden.is_allowed(PrincipalId::new(999), seeded.account, "/Account/Edit");
    assert!(matches!(result, Err(WardenError::Permission(_))));
    Ok(())
}

#[tokio::test]
async fn test_explain_with_decision_logging() -> Result<()> {
    init_tracing();
    let config = WardenConfig {
        log_decisions: true,
        ..Default::default()
    };
    let mut warden = Warden::open(MemoryStore::new(), config).await?;
    let seeded = seed(&mut warden).await?;

    let decision = warden.explain(seeded.ayende, seeded.account, "/Account/Edit")?;
    assert!(!decision.allowed);
    assert_eq!(decision.reason, warden::Reason::Denied);
    assert_eq!(decision.deciding.len(), 1);

    let rules = warden.permissions_for_operation(seeded.ayende, "/Account/Edit")?;
    assert_eq!(rules.len(), 2);
    Ok(())
}
