//! Key directory
//!
//! Owns every list handle. A key present in the map always carries its lock.
//! Handles are only removed when the Create that inserted them fails to
//! reach the WAL.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use super::ListState;

/// Contents of one list
#[derive(Debug, Default)]
pub(crate) struct ListSlot {
    pub(crate) items: Vec<i64>,

    /// Set when the Create for this key failed to log; the key is being
    /// withdrawn and must read as absent
    pub(crate) retired: bool,
}

/// A list together with the lock that guards it
pub(crate) type ListHandle = Arc<RwLock<ListSlot>>;

pub(crate) type HandleMap = BTreeMap<String, ListHandle>;

pub(crate) struct KeyDirectory {
    lists: RwLock<HandleMap>,
}

impl KeyDirectory {
    pub(crate) fn from_state(state: ListState) -> Self {
        let lists = state
            .into_iter()
            .map(|(key, items)| {
                let slot = ListSlot {
                    items,
                    retired: false,
                };
                (key, Arc::new(RwLock::new(slot)))
            })
            .collect();

        Self {
            lists: RwLock::new(lists),
        }
    }

    /// Clone the handle for `key`; the directory lock is released on return
    pub(crate) fn handle(&self, key: &str) -> Option<ListHandle> {
        self.lists.read().get(key).cloned()
    }

    /// Insert `handle` unless the key exists; returns whether it was inserted
    ///
    /// The directory lock is held only for the map insertion.
    pub(crate) fn insert_new(&self, key: &str, handle: &ListHandle) -> bool {
        let mut lists = self.lists.write();
        if lists.contains_key(key) {
            return false;
        }
        lists.insert(key.to_string(), Arc::clone(handle));
        true
    }

    /// Remove `key` if it still maps to `handle`
    pub(crate) fn withdraw(&self, key: &str, handle: &ListHandle) {
        let mut lists = self.lists.write();
        if lists.get(key).is_some_and(|h| Arc::ptr_eq(h, handle)) {
            lists.remove(key);
        }
    }

    /// Shared access to the whole map (capture, key listing)
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, HandleMap> {
        self.lists.read()
    }
}
