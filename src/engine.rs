//! Engine Module
//!
//! The core list engine that coordinates all components.
//!
//! ## Responsibilities
//! - Run recovery before accepting any operation
//! - Route commands to the list store
//! - Own the background snapshot worker and stop it on close

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::clock::LogicalClock;
use crate::config::Config;
use crate::error::Result;
use crate::protocol::Command;
use crate::recovery::{RecoveryCoordinator, RecoveryStats};
use crate::snapshot::{SnapshotFile, SnapshotManager, SnapshotStats, SnapshotWorker};
use crate::store::ListStore;
use crate::wal::WalWriter;

/// The main list engine
///
/// Shareable across threads behind an `Arc`; every operation takes `&self`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Lists, per-key locks and the WAL writer
    store: Arc<ListStore>,

    /// On-demand snapshots (shares its cycle lock with the worker)
    snapshots: SnapshotManager,

    /// Background snapshot thread, absent when the interval is zero
    worker: Option<SnapshotWorker>,

    /// What startup recovery found
    recovery: RecoveryStats,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Recover state from snapshot + WAL
    /// 3. Open the WAL for appending, clock seeded past recovered history
    /// 4. Start the snapshot worker
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let recovered = RecoveryCoordinator::from_config(&config).recover()?;
        tracing::info!(
            "Recovered {} lists (snapshot={}, watermark={}, replayed={}, skipped={}, corrupted={})",
            recovered.state.len(),
            recovered.stats.snapshot_loaded,
            recovered.watermark,
            recovered.stats.entries_replayed,
            recovered.stats.entries_skipped,
            recovered.stats.entries_corrupted
        );

        let clock = Arc::new(LogicalClock::starting_after(recovered.last_timestamp));
        let wal = WalWriter::open(
            &config.wal_path(),
            config.wal_sync_strategy,
            Arc::clone(&clock),
        )?;
        let store = Arc::new(ListStore::new(recovered.state, wal, clock));

        let snapshots = SnapshotManager::new(
            Arc::clone(&store),
            SnapshotFile::new(config.snapshot_path()),
            config.truncate_wal_on_snapshot,
        );
        let worker = if config.snapshot_interval.is_zero() {
            None
        } else {
            Some(snapshots.clone().spawn(config.snapshot_interval)?)
        };

        Ok(Self {
            config,
            store,
            snapshots,
            worker,
            recovery: recovered.stats,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Execute a command
    ///
    /// Returns the value produced by Get/Remove/Size, `None` otherwise.
    pub fn execute(&self, command: Command) -> Result<Option<i64>> {
        match command {
            Command::Create { key } => self.create(&key).map(|_| None),
            Command::Append { key, value } => self.append(&key, value).map(|_| None),
            Command::Get { key, index } => self.get(&key, index).map(Some),
            Command::Remove { key } => self.remove(&key).map(Some),
            Command::Size { key } => Ok(Some(self.size(&key) as i64)),
            Command::Ping => Ok(None),
        }
    }

    pub fn create(&self, key: &str) -> Result<()> {
        self.store.create(key)
    }

    pub fn append(&self, key: &str, value: i64) -> Result<()> {
        self.store.append(key, value)
    }

    pub fn get(&self, key: &str, index: i64) -> Result<i64> {
        self.store.get(key, index)
    }

    pub fn remove(&self, key: &str) -> Result<i64> {
        self.store.remove(key)
    }

    pub fn size(&self, key: &str) -> usize {
        self.store.size(key)
    }

    /// Copy of one list's contents
    pub fn items(&self, key: &str) -> Result<Vec<i64>> {
        self.store.items(key)
    }

    /// All keys in lexicographic order
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Take a snapshot now, outside the worker's schedule
    pub fn snapshot(&self) -> Result<SnapshotStats> {
        self.snapshots.take_snapshot()
    }

    /// Close the engine gracefully
    ///
    /// Stops the snapshot worker, takes a final snapshot and syncs the WAL.
    /// The WAL is synced even when the snapshot fails; the snapshot error is
    /// the one returned.
    pub fn close(mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }

        let snapshot = self.snapshots.take_snapshot();
        let synced = self.store.sync_log();

        match snapshot {
            Ok(stats) => {
                tracing::info!(
                    "Final snapshot: watermark={} lists={} elements={}",
                    stats.watermark,
                    stats.lists,
                    stats.elements
                );
                synced
            }
            Err(e) => {
                tracing::error!("Final snapshot failed: {}", e);
                if let Err(sync_err) = synced {
                    tracing::error!("Final WAL sync failed: {}", sync_err);
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters from startup recovery
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery
    }

    /// Whether the background snapshot worker is running
    pub fn snapshot_worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(SnapshotWorker::is_running)
    }

    /// Number of lists
    pub fn list_count(&self) -> usize {
        self.store.list_count()
    }

    /// Current WAL length in bytes
    pub fn wal_len_bytes(&self) -> u64 {
        self.store.log_len_bytes()
    }

    pub fn store(&self) -> &Arc<ListStore> {
        &self.store
    }
}
