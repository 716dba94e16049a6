//! Operation hierarchy keyed by slash-delimited paths.
//!
//! Creating `/Account/Delete` materializes `/Account` if it is missing and
//! links each operation under its immediate prefix. A permission on a
//! prefix governs every path below it, so the resolver walks this tree
//! upward.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arena::Arena;
use crate::error::{CoreError, Namespace, Result};
use crate::names::NamedIndex;
use crate::types::OperationId;

/// Path separator for operation names.
pub const SEPARATOR: char = '/';

/// A named operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    /// Full path, e.g. `/Account/Delete`.
    pub name: String,
    pub parent: Option<OperationId>,
    pub children: BTreeSet<OperationId>,
}

impl Operation {
    /// The last path segment.
    pub fn segment(&self) -> &str {
        self.name
            .rsplit(SEPARATOR)
            .next()
            .unwrap_or(self.name.as_str())
    }
}

/// Split a path into its cumulative prefixes.
///
/// `/Account/Delete` yields `["/Account", "/Account/Delete"]`.
pub fn path_prefixes(path: &str) -> Result<Vec<&str>> {
    let invalid = |reason| CoreError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    let rest = path
        .strip_prefix(SEPARATOR)
        .ok_or_else(|| invalid("must start with '/'"))?;
    if rest.is_empty() {
        return Err(invalid("must name at least one segment"));
    }

    let mut prefixes = Vec::new();
    let mut end = 0;
    for segment in rest.split(SEPARATOR) {
        if segment.is_empty() {
            return Err(invalid("contains an empty segment"));
        }
        end += SEPARATOR.len_utf8() + segment.len();
        prefixes.push(&path[..end]);
    }
    Ok(prefixes)
}

/// The forest of operations plus its name index.
#[derive(Debug, Clone)]
pub struct OperationHierarchy {
    operations: Arena<OperationId, Operation>,
    names: NamedIndex<OperationId>,
}

impl OperationHierarchy {
    pub fn new() -> Self {
        Self {
            operations: Arena::new(),
            names: NamedIndex::new(Namespace::Operation),
        }
    }

    /// Create the operation at `path`, creating any missing ancestors.
    ///
    /// Fails with `DuplicateName` if the full path already exists. Every
    /// check runs before the first insert.
    pub fn create(&mut self, path: &str) -> Result<OperationId> {
        let created = self.create_all(path)?;
        // the leaf is always created, so the list is never empty
        created.last().copied().ok_or_else(|| CoreError::InvalidPath {
            path: path.to_string(),
            reason: "must name at least one segment",
        })
    }

    /// Like [`OperationHierarchy::create`] but returns every operation it
    /// created, outermost first and the leaf last. Prefixes that already
    /// existed are not included.
    pub fn create_all(&mut self, path: &str) -> Result<Vec<OperationId>> {
        let prefixes = path_prefixes(path)?;
        self.names.ensure_available(path)?;

        let mut created = Vec::new();
        let mut parent: Option<OperationId> = None;
        for prefix in prefixes {
            let id = match self.names.get(prefix) {
                Some(existing) => existing,
                None => {
                    let id = self.operations.insert_with(|id| Operation {
                        id,
                        name: prefix.to_string(),
                        parent,
                        children: BTreeSet::new(),
                    });
                    self.names.insert(prefix, id)?;
                    if let Some(pid) = parent {
                        if let Some(p) = self.operations.get_mut(pid) {
                            p.children.insert(id);
                        }
                    }
                    debug!(operation = %prefix, "created operation");
                    created.push(id);
                    id
                }
            };
            parent = Some(id);
        }
        Ok(created)
    }

    /// Validate that `path` may be removed and return its id.
    pub fn check_removable(&self, path: &str) -> Result<OperationId> {
        let id = self.lookup(path)?;
        if !self.expect(id)?.children.is_empty() {
            return Err(CoreError::HasChildren {
                namespace: Namespace::Operation,
                name: path.to_string(),
            });
        }
        Ok(id)
    }

    /// Remove a leaf operation and detach it from its parent.
    pub fn remove(&mut self, id: OperationId) -> Result<Operation> {
        let name = self.expect(id)?.name.clone();
        self.check_removable(&name)?;

        let operation = self
            .operations
            .remove(id)
            .ok_or_else(|| CoreError::not_found("operation", id))?;
        self.names.remove(&operation.name);
        if let Some(pid) = operation.parent {
            if let Some(p) = self.operations.get_mut(pid) {
                p.children.remove(&id);
            }
        }
        debug!(operation = %operation.name, "removed operation");
        Ok(operation)
    }

    pub fn get(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id)
    }

    pub fn get_by_name(&self, path: &str) -> Option<&Operation> {
        self.names.get(path).and_then(|id| self.operations.get(id))
    }

    pub fn lookup(&self, path: &str) -> Result<OperationId> {
        self.names.lookup(path)
    }

    pub fn expect(&self, id: OperationId) -> Result<&Operation> {
        self.operations
            .get(id)
            .ok_or_else(|| CoreError::not_found("operation", id))
    }

    /// Walk parent links upward from `id`, excluding `id` itself.
    pub fn ancestors(&self, id: OperationId) -> impl Iterator<Item = &Operation> + '_ {
        let start = self.operations.get(id).and_then(|o| o.parent);
        std::iter::successors(start.and_then(|p| self.operations.get(p)), move |o| {
            o.parent.and_then(|p| self.operations.get(p))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> + '_ {
        self.operations.iter().map(|(_, o)| o)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Put back a persisted operation. Call [`OperationHierarchy::relink`]
    /// once all operations are restored.
    pub fn restore(&mut self, id: OperationId, path: &str, parent: Option<OperationId>) -> Result<()> {
        path_prefixes(path)?;
        self.names.ensure_available(path)?;
        let operation = Operation {
            id,
            name: path.to_string(),
            parent,
            children: BTreeSet::new(),
        };
        self.operations.restore("operation", id, operation)?;
        self.names.insert(path, id)
    }

    /// The id the next created operation will get.
    pub fn next_id(&self) -> OperationId {
        self.operations.next_id()
    }

    pub fn advance_to(&mut self, next: u64) -> Result<()> {
        self.operations.advance_to("operation", next)
    }

    /// Check parent links against paths and recompute child sets.
    ///
    /// Each operation's parent must be the operation named by its immediate
    /// path prefix, and a root path must have no parent. That keeps the
    /// links acyclic since every parent has a strictly shorter path.
    pub fn relink(&mut self) -> Result<()> {
        let mut links = Vec::new();
        for (id, op) in self.operations.iter() {
            let prefixes = path_prefixes(&op.name)?;
            let expected = match prefixes.len() {
                0 | 1 => None,
                n => Some(self.names.lookup(prefixes[n - 2])?),
            };
            if op.parent != expected {
                return Err(CoreError::InvalidPath {
                    path: op.name.clone(),
                    reason: "parent does not match its path prefix",
                });
            }
            if let Some(pid) = expected {
                links.push((id, pid));
            }
        }

        for (_, op) in self.operations.iter_mut() {
            op.children.clear();
        }
        for (id, pid) in links {
            self.operations
                .get_mut(pid)
                .ok_or_else(|| CoreError::not_found("operation", pid))?
                .children
                .insert(id);
        }
        Ok(())
    }
}

impl Default for OperationHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_path_prefixes() {
        assert_eq!(
            path_prefixes("/Account/Delete").unwrap(),
            vec!["/Account", "/Account/Delete"]
        );
        assert_eq!(path_prefixes("/Account").unwrap(), vec!["/Account"]);
    }

    #[test]
    fn test_invalid_paths() {
        for bad in ["", "/", "Account", "/Account/", "//Account", "/Account//Delete"] {
            let err = path_prefixes(bad).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidPath { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_create_materializes_parent() {
        let mut ops = OperationHierarchy::new();
        let delete = ops.create("/Account/Delete").unwrap();

        let parent = ops.get_by_name("/Account").unwrap();
        assert_eq!(ops.get(delete).unwrap().parent, Some(parent.id));
        assert!(parent.children.contains(&delete));
        assert_eq!(ops.get(delete).unwrap().segment(), "Delete");
    }

    #[test]
    fn test_create_reuses_existing_parent() {
        let mut ops = OperationHierarchy::new();
        ops.create("/Account/Edit").unwrap();
        ops.create("/Account/Delete").unwrap();

        assert_eq!(ops.len(), 3);
        assert_eq!(ops.get_by_name("/Account").unwrap().children.len(), 2);
    }

    #[test]
    fn test_create_existing_path_fails() {
        let mut ops = OperationHierarchy::new();
        ops.create("/Account/Edit").unwrap();

        assert!(matches!(
            ops.create("/Account/Edit").unwrap_err(),
            CoreError::DuplicateName { .. }
        ));
        assert!(matches!(
            ops.create("/Account").unwrap_err(),
            CoreError::DuplicateName { .. }
        ));
    }

    #[test]
    fn test_invalid_path_creates_nothing() {
        let mut ops = OperationHierarchy::new();
        assert!(ops.create("/Account//Delete").is_err());
        assert!(ops.is_empty());
    }

    #[test]
    fn test_remove_parent_fails() {
        let mut ops = OperationHierarchy::new();
        ops.create("/Account/Edit").unwrap();

        let err = ops.check_removable("/Account").unwrap_err();
        assert!(matches!(err, CoreError::HasChildren { .. }));
    }

    #[test]
    fn test_create_all_returns_only_new_operations() {
        let mut ops = OperationHierarchy::new();
        let first = ops.create_all("/Account/Edit").unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(ops.get(first[0]).unwrap().name, "/Account");
        assert_eq!(ops.get(first[1]).unwrap().name, "/Account/Edit");

        let second = ops.create_all("/Account/Delete").unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(ops.get(second[0]).unwrap().name, "/Account/Delete");
    }

    #[test]
    fn test_relink_rejects_crossed_parents() {
        let mut ops = OperationHierarchy::new();
        ops.restore(OperationId::new(1), "/A", Some(OperationId::new(2))).unwrap();
        ops.restore(OperationId::new(2), "/B", Some(OperationId::new(1))).unwrap();

        let err = ops.relink().unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn test_relink_rejects_parent_other_than_prefix() {
        let mut ops = OperationHierarchy::new();
        ops.restore(OperationId::new(1), "/Account", None).unwrap();
        ops.restore(OperationId::new(2), "/Orders", None).unwrap();
        ops.restore(OperationId::new(3), "/Account/Edit", Some(OperationId::new(2)))
            .unwrap();
        assert!(matches!(
            ops.relink().unwrap_err(),
            CoreError::InvalidPath { .. }
        ));

        let mut orphan = OperationHierarchy::new();
        orphan.restore(OperationId::new(3), "/Account/Edit", None).unwrap();
        assert!(matches!(
            orphan.relink().unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_restore_and_relink() {
        let mut ops = OperationHierarchy::new();
        ops.restore(OperationId::new(4), "/Account/Edit", Some(OperationId::new(2)))
            .unwrap();
        ops.restore(OperationId::new(2), "/Account", None).unwrap();
        ops.relink().unwrap();

        assert!(ops.get(OperationId::new(2)).unwrap().children.contains(&OperationId::new(4)));
        let names: Vec<&str> = ops
            .ancestors(OperationId::new(4))
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["/Account"]);

        let err = ops.restore(OperationId::new(4), "/Orders", None).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { .. }));
        assert!(ops.get_by_name("/Orders").is_none());
        assert_eq!(ops.create("/Orders").unwrap(), OperationId::new(5));
    }

    #[test]
    fn test_remove_nested_operation() {
        let mut ops = OperationHierarchy::new();
        let edit = ops.create("/Account/Edit").unwrap();

        ops.remove(edit).unwrap();
        assert!(ops.get_by_name("/Account/Edit").is_none());
        assert!(ops.get_by_name("/Account").unwrap().children.is_empty());
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9]{0,7}"
    }

    proptest! {
        #[test]
        fn prop_every_prefix_exists_and_links_to_its_parent(
            paths in prop::collection::vec(prop::collection::vec(segment(), 1..5), 1..10)
        ) {
            let mut ops = OperationHierarchy::new();
            for segments in &paths {
                let path = format!("/{}", segments.join("/"));
                let _ = ops.create(&path);
            }

            for segments in &paths {
                let mut parent: Option<OperationId> = None;
                for depth in 1..=segments.len() {
                    let prefix = format!("/{}", segments[..depth].join("/"));
                    let op = ops.get_by_name(&prefix);
                    prop_assert!(op.is_some(), "missing {}", prefix);
                    let op = op.unwrap();
                    prop_assert_eq!(op.parent, parent);
                    if let Some(pid) = parent {
                        prop_assert!(ops.get(pid).unwrap().children.contains(&op.id));
                    }
                    parent = Some(op.id);
                }
            }

            let distinct: BTreeSet<String> = paths
                .iter()
                .flat_map(|s| (1..=s.len()).map(move |d| format!("/{}", s[..d].join("/"))))
                .collect();
            prop_assert_eq!(ops.len(), distinct.len());
            prop_assert!(ops.relink().is_ok());
        }
    }
}
