//! Per-entity mutual exclusion.
//!
//! Definitions are immutable and shared freely; entities are not. Callers
//! that handle events for the same entity from several threads serialize
//! them through an [`EntityLocks`] table.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Table of locks keyed by entity id.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Returns the lock for `entity_id`, creating it on first use.
    pub fn lock_for(&self, entity_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(entity_id) {
            return Arc::clone(lock.value());
        }
        self.locks
            .entry(entity_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Drops the entry for `entity_id` when no caller holds a handle to it.
    ///
    /// Returns true when the entry was removed.
    pub fn release(&self, entity_id: &str) -> bool {
        self.locks
            .remove_if(entity_id, |_, lock| Arc::strong_count(lock) == 1)
            .is_some()
    }

    /// Drops the lock for an entity that is no longer handled.
    pub fn remove(&self, entity_id: &str) -> bool {
        self.locks.remove(entity_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
