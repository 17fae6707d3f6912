//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append one entry per accepted mutation before it is acknowledged
//! - Logical timestamps for ordering against snapshot watermarks
//! - Line-oriented reading that tolerates malformed lines
//! - Truncation of entries covered by a snapshot
//!
//! ## File Format
//! ```text
//! {"op":"create","list_id":"A","value":0,"timestamp":1700000000000000001}
//! {"op":"append","list_id":"A","value":1,"timestamp":1700000000000000002}
//! {"op":"remove","list_id":"A","value":1,"timestamp":1700000000000000003}
//! ```

mod entry;
mod writer;
mod reader;

pub use entry::{LogEntry, LogOp};
pub use writer::{PendingTruncation, TruncateStats, WalWriter};
pub use reader::{WalReader, WalRecord};

pub(crate) use writer::{sync_parent_dir, tmp_path_for};

/// File name of the WAL inside the data directory
pub const WAL_FILENAME: &str = "log.jsonl";
