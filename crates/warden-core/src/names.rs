//! Uniqueness-enforced name index.
//!
//! Every named record (groups, operations, entity types) is reachable by its
//! name through one of these. Each namespace owns its own index; there is no
//! process-wide table.

use std::collections::HashMap;

use crate::error::{CoreError, Namespace, Result};

/// Maps unique names to ids within one namespace.
#[derive(Debug, Clone)]
pub struct NamedIndex<I> {
    namespace: Namespace,
    by_name: HashMap<String, I>,
}

impl<I: Copy + PartialEq> NamedIndex<I> {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            by_name: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Fail with `DuplicateName` if `name` is taken.
    pub fn ensure_available(&self, name: &str) -> Result<()> {
        if self.by_name.contains_key(name) {
            return Err(CoreError::DuplicateName {
                namespace: self.namespace,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, name: &str, id: I) -> Result<()> {
        self.ensure_available(name)?;
        self.by_name.insert(name.to_string(), id);
        Ok(())
    }

    /// Move `id` from `old` to `new`. Renaming onto its own name is a no-op.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let id = self.lookup(old)?;
        self.ensure_available(new)?;
        self.by_name.remove(old);
        self.by_name.insert(new.to_string(), id);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<I> {
        self.by_name.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<I> {
        self.by_name.get(name).copied()
    }

    /// Like [`NamedIndex::get`] but fails with `NotFound`.
    pub fn lookup(&self, name: &str) -> Result<I> {
        self.get(name).ok_or_else(|| CoreError::NotFound {
            what: self.namespace.label(),
            key: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
