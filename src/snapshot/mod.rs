//! Snapshot Module
//!
//! Periodic full-state checkpoints that bound WAL replay.
//!
//! ## Cycle
//! 1. Capture every list under the store's locks, stamped with a watermark
//! 2. Release the locks
//! 3. Write `snapshot.json.tmp`, fsync, rename over `snapshot.json`
//! 4. Optionally drop WAL entries at or below the watermark
//!
//! ## File Format
//! ```text
//! {
//!   "timestamp": 1700000000000000000,
//!   "lists": { "A": [1, 2], "B": [] }
//! }
//! ```

mod file;
mod manager;

pub use file::{SnapshotFile, SnapshotRecord};
pub use manager::{SnapshotManager, SnapshotStats, SnapshotWorker};

/// File name of the snapshot inside the data directory
pub const SNAPSHOT_FILENAME: &str = "snapshot.json";
