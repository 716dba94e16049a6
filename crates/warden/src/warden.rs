//! The main Warden implementation.

use std::sync::Arc;

use tracing::{debug, info};
use warden_core::{EntityId, Group, PrincipalId};
use warden_perms::{Authorization, Decision, Permission, DEFAULT_LEVEL};
use warden_store::{Store, StoreExt};

use crate::error::{Result, WardenError};
use crate::unit_of_work::UnitOfWork;

/// Configuration for a Warden instance.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Level given to grants that do not name one.
    pub default_level: i32,

    /// Log every denied check at `debug` level.
    pub log_decisions: bool,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_LEVEL,
            log_decisions: false,
        }
    }
}

/// An authorization engine backed by a store.
///
/// Queries read the committed engine. Edits go through a
/// [`UnitOfWork`] and reach both the store and the engine on commit.
pub struct Warden<S: Store> {
    pub(crate) store: Arc<S>,
    pub(crate) config: WardenConfig,
    pub(crate) engine: Authorization,
}

impl<S: Store> Warden<S> {
    /// Open a Warden over `store`, rebuilding the engine from its records.
    pub async fn open(store: S, config: WardenConfig) -> Result<Self> {
        let store = Arc::new(store);
        let engine = load(store.as_ref(), config.default_level).await?;
        info!(
            principals = engine.directory().principals().count(),
            permissions = engine.permissions().len(),
            "opened warden"
        );
        Ok(Self {
            store,
            config,
            engine,
        })
    }

    /// Discard the in-memory engine and rebuild it from the store.
    pub async fn reload(&mut self) -> Result<()> {
        self.engine = load(self.store.as_ref(), self.config.default_level).await?;
        Ok(())
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// The committed engine.
    pub fn engine(&self) -> &Authorization {
        &self.engine
    }

    /// Start staging edits. Nothing is visible until
    /// [`UnitOfWork::commit`] succeeds.
    pub fn begin_unit_of_work(&mut self) -> UnitOfWork<'_, S> {
        UnitOfWork::new(self)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_allowed(&self, principal: PrincipalId, entity: EntityId, operation: &str) -> Result<bool> {
        Ok(self.explain(principal, entity, operation)?.allowed)
    }

    pub fn is_allowed_everywhere(&self, principal: PrincipalId, operation: &str) -> Result<bool> {
        let allowed = self.engine.is_allowed_everywhere(principal, operation)?;
        if self.config.log_decisions && !allowed {
            debug!(%principal, operation, "denied everywhere");
        }
        Ok(allowed)
    }

    pub fn explain(&self, principal: PrincipalId, entity: EntityId, operation: &str) -> Result<Decision> {
        let decision = self.engine.explain(principal, entity, operation)?;
        if self.config.log_decisions && !decision.allowed {
            debug!(
                %principal,
                %entity,
                operation,
                reason = ?decision.reason,
                deciding = ?decision.deciding,
                "denied"
            );
        }
        Ok(decision)
    }

    pub fn permissions_for(&self, principal: PrincipalId) -> Result<Vec<&Permission>> {
        Ok(self.engine.permissions_for(principal)?)
    }

    pub fn permissions_for_entity(&self, principal: PrincipalId, entity: EntityId) -> Result<Vec<&Permission>> {
        Ok(self.engine.permissions_for_entity(principal, entity)?)
    }

    pub fn permissions_for_operation(&self, principal: PrincipalId, operation: &str) -> Result<Vec<&Permission>> {
        Ok(self.engine.permissions_for_operation(principal, operation)?)
    }

    pub fn ancestry_association(&self, principal: PrincipalId, target: &str) -> Result<Vec<&Group>> {
        Ok(self.engine.ancestry_association(principal, target)?)
    }
}

async fn load<S: Store + ?Sized>(store: &S, default_level: i32) -> Result<Authorization> {
    let records = store.load_all().await?;
    let count = records.len();
    let engine = Authorization::from_records(records, default_level)
        .map_err(|e| WardenError::CorruptSnapshot(e.to_string()))?;
    debug!(records = count, "loaded engine from store");
    Ok(engine)
}
