//! Recovery
//!
//! Rebuilds list state at startup from the latest snapshot plus the WAL
//! entries stamped after its watermark.
//!
//! ## Steps
//! 1. Remove a leftover snapshot temp file (crash mid-snapshot)
//! 2. Load the snapshot, or start empty at watermark 0
//! 3. Read the WAL line by line, skipping malformed lines with a warning
//! 4. Skip entries at or below the watermark, replay the rest in file order
//!
//! Recovery only reads; running it any number of times over the same files
//! produces the same state.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{ListError, Result};
use crate::snapshot::SnapshotFile;
use crate::store::ListState;
use crate::wal::{WalReader, WalRecord};

/// Counters describing a recovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Whether a snapshot file was found and loaded
    pub snapshot_loaded: bool,

    /// Entries newer than the watermark, applied
    pub entries_replayed: u64,

    /// Entries at or below the watermark, already in the snapshot
    pub entries_skipped: u64,

    /// Lines that could not be parsed
    pub entries_corrupted: u64,
}

/// State rebuilt by [`RecoveryCoordinator::recover`]
#[derive(Debug, Clone, Default)]
pub struct Recovered {
    pub state: ListState,

    /// Watermark of the loaded snapshot (0 if none)
    pub watermark: i64,

    /// Highest timestamp seen in the snapshot or the WAL
    pub last_timestamp: i64,

    pub stats: RecoveryStats,
}

/// Runs once, before the store accepts traffic
pub struct RecoveryCoordinator {
    snapshot: SnapshotFile,
    wal_path: PathBuf,
}

impl RecoveryCoordinator {
    pub fn new(snapshot_path: impl Into<PathBuf>, wal_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot: SnapshotFile::new(snapshot_path),
            wal_path: wal_path.into(),
        }
    }

    /// Use the file locations derived from `config.data_dir`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.snapshot_path(), config.wal_path())
    }

    pub fn recover(&self) -> Result<Recovered> {
        if self.snapshot.remove_stale_tmp()? {
            tracing::warn!(
                "Removed incomplete snapshot {}; previous snapshot stays authoritative",
                self.snapshot.tmp_path().display()
            );
        }

        let mut recovered = match self.snapshot.load()? {
            Some(record) => Recovered {
                state: record.lists,
                watermark: record.watermark,
                last_timestamp: record.watermark,
                stats: RecoveryStats {
                    snapshot_loaded: true,
                    ..RecoveryStats::default()
                },
            },
            None => Recovered::default(),
        };

        let Some(reader) = open_wal(&self.wal_path)? else {
            return Ok(recovered);
        };

        for record in reader {
            match record? {
                WalRecord::Entry(entry) => {
                    recovered.last_timestamp = recovered.last_timestamp.max(entry.timestamp);

                    if entry.timestamp <= recovered.watermark {
                        recovered.stats.entries_skipped += 1;
                        continue;
                    }

                    entry.apply(&mut recovered.state);
                    recovered.stats.entries_replayed += 1;
                }
                WalRecord::Malformed { line, error } => {
                    tracing::warn!(
                        "Skipping malformed WAL line {} in {}: {}",
                        line,
                        self.wal_path.display(),
                        error
                    );
                    recovered.stats.entries_corrupted += 1;
                }
            }
        }

        Ok(recovered)
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn snapshot_path(&self) -> &Path {
        self.snapshot.path()
    }
}

/// A missing WAL just means no history
fn open_wal(path: &Path) -> Result<Option<WalReader>> {
    match WalReader::open(path) {
        Ok(reader) => Ok(Some(reader)),
        Err(ListError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
