//! Store Module
//!
//! In-memory keyed lists, mutated concurrently and journaled to the WAL.
//!
//! ## Responsibilities
//! - Create/Append/Get/Remove/Size over independently locked lists
//! - Directory-level lock for key-set changes only
//! - Consistent full-state capture for snapshots
//!
//! ## Locking
//! ```text
//!   directory (RwLock<BTreeMap<key, handle>>)
//!        │  lookup under shared lock, released before touching content
//!        ▼
//!   per-key handle (Arc<RwLock<ListSlot>>)
//!        │  exclusive for append/remove, shared for get/size
//!        ▼
//!   WAL writer (Mutex)
//! ```
//!
//! Capture takes the directory shared, then every per-key lock shared in
//! lexicographic key order, so it never observes a half-applied mutation.
//!
//! Create inserts its handle already locked exclusive, releases the
//! directory, then journals. A Create whose journal write fails marks the
//! handle retired before unlocking it and only then retakes the directory to
//! withdraw the key, so it never waits on the directory while holding a key.

mod directory;
mod table;

use std::collections::BTreeMap;

pub use table::ListStore;

/// Plain list state: what snapshots hold and what recovery rebuilds
pub type ListState = BTreeMap<String, Vec<i64>>;
