//! ListStore implementation
//!
//! Per-key RwLocks over a directory map, with every mutation journaled.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::clock::LogicalClock;
use crate::error::{ListError, Result};
use crate::snapshot::SnapshotRecord;
use crate::wal::{LogOp, TruncateStats, WalWriter};

use super::directory::{KeyDirectory, ListHandle, ListSlot};
use super::ListState;

/// Keyed store of append/pop integer lists
///
/// ## Concurrency Model
///
/// - Different keys never contend except on the WAL writer mutex.
/// - Same-key mutations serialize on that key's exclusive lock; Get/Size
///   share it.
/// - Inside a mutation the WAL entry is written before memory changes, so a
///   failed journal write leaves the list untouched. Readers need the same
///   lock and cannot tell the order apart.
/// - Create holds the directory lock only to insert the new, already locked
///   handle. Its WAL append runs under that key's lock alone, so operations
///   on the new key wait for the Create entry while other keys do not.
/// - Truncation filters the log without the WAL mutex; appends stall only
///   while the entries logged in the meantime are carried over.
pub struct ListStore {
    directory: KeyDirectory,

    /// Single-writer journal; timestamps are issued under this mutex
    wal: Mutex<WalWriter>,

    /// One log truncation at a time
    truncation: Mutex<()>,

    /// Shared with the WAL writer; also stamps snapshot watermarks
    clock: Arc<LogicalClock>,
}

impl ListStore {
    /// Build a store over recovered state
    ///
    /// `clock` must be the clock the WAL writer stamps entries with.
    pub fn new(state: ListState, wal: WalWriter, clock: Arc<LogicalClock>) -> Self {
        Self {
            directory: KeyDirectory::from_state(state),
            wal: Mutex::new(wal),
            truncation: Mutex::new(()),
            clock,
        }
    }

    /// Create an empty list
    pub fn create(&self, key: &str) -> Result<()> {
        let handle: ListHandle = Arc::new(RwLock::new(ListSlot::default()));
        let mut slot = handle.write();

        if !self.directory.insert_new(key, &handle) {
            return Err(ListError::AlreadyExists(key.to_string()));
        }

        if let Err(e) = self.wal.lock().append(LogOp::Create, key, 0) {
            // Retire before unlocking: capture may be holding the directory
            // while it waits for this key
            slot.retired = true;
            drop(slot);
            self.directory.withdraw(key, &handle);
            return Err(e);
        }

        Ok(())
    }

    /// Append a value to the tail of an existing list
    pub fn append(&self, key: &str, value: i64) -> Result<()> {
        let handle = self.handle(key)?;
        let mut slot = handle.write();
        ensure_live(key, &slot)?;

        self.wal.lock().append(LogOp::Append, key, value)?;
        slot.items.push(value);

        Ok(())
    }

    /// Get the element at a 0-based position in append order
    pub fn get(&self, key: &str, index: i64) -> Result<i64> {
        let handle = self.handle(key)?;
        let slot = handle.read();
        ensure_live(key, &slot)?;

        usize::try_from(index)
            .ok()
            .and_then(|i| slot.items.get(i).copied())
            .ok_or_else(|| ListError::InvalidIndex {
                key: key.to_string(),
                index,
                len: slot.items.len(),
            })
    }

    /// Remove and return the most recently appended element
    pub fn remove(&self, key: &str) -> Result<i64> {
        let handle = self.handle(key)?;
        let mut slot = handle.write();
        ensure_live(key, &slot)?;

        let value = *slot
            .items
            .last()
            .ok_or_else(|| ListError::EmptyList(key.to_string()))?;

        self.wal.lock().append(LogOp::Remove, key, value)?;
        slot.items.pop();

        Ok(value)
    }

    /// Length of a list; an absent key has size 0
    pub fn size(&self, key: &str) -> usize {
        match self.directory.handle(key) {
            Some(handle) => handle.read().items.len(),
            None => 0,
        }
    }

    /// Copy of one list's contents
    pub fn items(&self, key: &str) -> Result<Vec<i64>> {
        let handle = self.handle(key)?;
        let slot = handle.read();
        ensure_live(key, &slot)?;
        Ok(slot.items.clone())
    }

    /// All keys in lexicographic order
    pub fn keys(&self) -> Vec<String> {
        self.directory.read().keys().cloned().collect()
    }

    /// Number of lists
    pub fn list_count(&self) -> usize {
        self.directory.read().len()
    }

    /// Capture a consistent copy of every list plus its watermark
    ///
    /// Holds the directory lock shared (no creates) and every per-key lock
    /// shared, taken in key order (no appends/removes), only for the copy.
    /// Every WAL entry stamped before this point is reflected in the copy and
    /// every later entry is stamped above the watermark.
    pub fn capture(&self) -> SnapshotRecord {
        let lists = self.directory.read();
        let guards: Vec<(&String, RwLockReadGuard<'_, ListSlot>)> =
            lists.iter().map(|(key, handle)| (key, handle.read())).collect();

        let watermark = self.clock.tick();
        let copy: ListState = guards
            .iter()
            .filter(|(_, slot)| !slot.retired)
            .map(|(key, slot)| ((*key).clone(), slot.items.clone()))
            .collect();

        drop(guards);
        drop(lists);

        SnapshotRecord {
            watermark,
            lists: copy,
        }
    }

    /// Drop WAL entries at or below `watermark`
    ///
    /// The WAL mutex is held to fix the prefix and again to swap the file,
    /// never while the prefix is read and rewritten.
    pub fn truncate_log_through(&self, watermark: i64) -> Result<TruncateStats> {
        let _serial = self.truncation.lock();

        let mut pending = self.wal.lock().begin_truncation(watermark)?;
        pending.rewrite_prefix()?;
        let stats = self.wal.lock().finish_truncation(pending)?;

        tracing::debug!(
            "Truncated WAL through {}: kept {}, dropped {}",
            watermark,
            stats.kept,
            stats.dropped
        );
        Ok(stats)
    }

    /// Force the WAL to disk
    pub fn sync_log(&self) -> Result<()> {
        self.wal.lock().sync()
    }

    /// WAL entries written since the last fsync
    pub fn log_uncommitted(&self) -> usize {
        self.wal.lock().uncommitted_count()
    }

    /// Current WAL length in bytes
    pub fn log_len_bytes(&self) -> u64 {
        self.wal.lock().len_bytes()
    }

    pub fn clock(&self) -> &Arc<LogicalClock> {
        &self.clock
    }

    fn handle(&self, key: &str) -> Result<ListHandle> {
        self.directory
            .handle(key)
            .ok_or_else(|| ListError::NotFound(key.to_string()))
    }
}

fn ensure_live(key: &str, slot: &ListSlot) -> Result<()> {
    if slot.retired {
        return Err(ListError::NotFound(key.to_string()));
    }
    Ok(())
}
