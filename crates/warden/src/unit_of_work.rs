//! Staged edits against a [`Warden`].

use std::ops::{Deref, DerefMut};

use tracing::info;
use warden_perms::{Authorization, RecordChange};
use warden_store::Store;

use crate::error::Result;
use crate::warden::Warden;

/// What a successful commit wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub upserts: usize,
    pub deletes: usize,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.upserts == 0 && self.deletes == 0
    }
}

/// A batch of edits staged on a copy of the engine.
///
/// Derefs to [`Authorization`], so every edit and query is available.
/// [`UnitOfWork::commit`] writes the changed records in one store batch and
/// then replaces the committed engine. Dropping the unit of work instead
/// discards it.
pub struct UnitOfWork<'w, S: Store> {
    warden: &'w mut Warden<S>,
    staged: Authorization,
}

impl<'w, S: Store> UnitOfWork<'w, S> {
    pub(crate) fn new(warden: &'w mut Warden<S>) -> Self {
        let staged = warden.engine.clone();
        Self { warden, staged }
    }

    /// Persist the staged edits and make them the committed state.
    ///
    /// If the store rejects the batch (for example a unique-name conflict),
    /// neither the store nor the committed engine changes.
    pub async fn commit(mut self) -> Result<CommitSummary> {
        let changes = self.staged.take_changes();
        let deletes = changes
            .iter()
            .filter(|c| matches!(c, RecordChange::Delete(_)))
            .count();
        let summary = CommitSummary {
            upserts: changes.len() - deletes,
            deletes,
        };

        if !summary.is_empty() {
            self.warden.store.apply(&changes).await?;
        }
        self.warden.engine = self.staged;

        info!(upserts = summary.upserts, deletes = summary.deletes, "committed unit of work");
        Ok(summary)
    }

    /// Drop the staged edits.
    pub fn rollback(self) {}
}

impl<S: Store> Deref for UnitOfWork<'_, S> {
    type Target = Authorization;

    fn deref(&self) -> &Authorization {
        &self.staged
    }
}

impl<S: Store> DerefMut for UnitOfWork<'_, S> {
    fn deref_mut(&mut self) -> &mut Authorization {
        &mut self.staged
    }
}
