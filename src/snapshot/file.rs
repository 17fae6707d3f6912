//! Snapshot file
//!
//! A single JSON document rewritten wholesale on every cycle through a
//! temporary file, so the previous snapshot stays valid until the new one is
//! fully on disk.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ListError, Result};
use crate::store::ListState;
use crate::wal::{sync_parent_dir, tmp_path_for};

/// Point-in-time image of every list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Every WAL entry stamped at or below this is reflected in `lists`
    #[serde(rename = "timestamp")]
    pub watermark: i64,

    pub lists: ListState,
}

impl SnapshotRecord {
    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    /// Total number of elements across all lists
    pub fn element_count(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }
}

/// Location of the snapshot document on disk
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tmp_path = tmp_path_for(&path);
        Self { path, tmp_path }
    }

    /// Load the snapshot; `Ok(None)` if none has been written yet
    ///
    /// A present but unreadable snapshot is an error: starting empty could
    /// lose data whose WAL entries were already truncated.
    pub fn load(&self) -> Result<Option<SnapshotRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            ListError::Snapshot(format!("parse {}: {}", self.path.display(), e))
        })
    }

    /// Persist a record: write temp, fsync, rename over the old snapshot
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, record: &SnapshotRecord) -> Result<u64> {
        let json = serde_json::to_vec_pretty(record)?;

        let mut file = File::create(&self.tmp_path)?;
        file.write_all(&json)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        Ok(json.len() as u64 + 1)
    }

    /// Delete a temp file left by a crash mid-write; returns whether one existed
    pub fn remove_stale_tmp(&self) -> Result<bool> {
        match fs::remove_file(&self.tmp_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }
}
