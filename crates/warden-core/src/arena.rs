//! Table of records keyed by identifier.
//!
//! Records refer to each other by id, never by pointer, so parent/child
//! links do not form ownership cycles. Ids are never reused within one
//! table: the next id only moves forward, even across removals and
//! restores.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Largest id a table accepts, the largest signed 64-bit value.
pub const MAX_ID: u64 = i64::MAX as u64;

/// An identifier usable as an arena key.
pub trait ArenaId: Copy + Ord + From<u64> + Into<u64> {}

impl<T: Copy + Ord + From<u64> + Into<u64>> ArenaId for T {}

/// A table of records addressed by `I`.
#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    records: BTreeMap<I, T>,
    next: u64,
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Create an empty arena. Ids start at 1.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next: 1,
        }
    }

    /// The id the next [`Arena::insert_with`] call will hand out.
    pub fn next_id(&self) -> I {
        I::from(self.next)
    }

    /// Insert a record built from its freshly assigned id.
    pub fn insert_with(&mut self, f: impl FnOnce(I) -> T) -> I {
        let id = self.next_id();
        self.records.insert(id, f(id));
        self.next += 1;
        id
    }

    /// Put a record back at a known id (used when loading from a store).
    ///
    /// `what` names the table in errors. Fails if the id is zero, beyond
    /// [`MAX_ID`], or already taken; nothing changes on failure.
    pub fn restore(&mut self, what: &'static str, id: I, value: T) -> Result<()> {
        let raw: u64 = id.into();
        if raw == 0 || raw > MAX_ID {
            return Err(CoreError::IdOutOfRange { what, id: raw });
        }
        if self.records.contains_key(&id) {
            return Err(CoreError::DuplicateId {
                what,
                id: raw.to_string(),
            });
        }
        self.records.insert(id, value);
        self.next = self.next.max(raw + 1);
        Ok(())
    }

    /// Move the next id forward to at least `next`.
    ///
    /// Used to carry a persisted high-water mark over ids whose records
    /// have since been removed. Never moves backwards.
    pub fn advance_to(&mut self, what: &'static str, next: u64) -> Result<()> {
        if next > MAX_ID + 1 {
            return Err(CoreError::IdOutOfRange { what, id: next });
        }
        self.next = self.next.max(next);
        Ok(())
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.records.get_mut(&id)
    }

    pub fn contains(&self, id: I) -> bool {
        self.records.contains_key(&id)
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        self.records.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate live records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.records.iter().map(|(id, v)| (*id, v))
    }

    /// Iterate live records mutably in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> + '_ {
        self.records.iter_mut().map(|(id, v)| (*id, v))
    }
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}
