//! Snapshot manager
//!
//! Periodic capture → persist → truncate, on a dedicated thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{ListError, Result};
use crate::store::ListStore;
use crate::wal::TruncateStats;

use super::SnapshotFile;

/// Outcome of one snapshot cycle
#[derive(Debug, Clone)]
pub struct SnapshotStats {
    pub watermark: i64,
    pub lists: usize,
    pub elements: usize,
    pub bytes: u64,

    /// Present when WAL truncation ran
    pub truncated: Option<TruncateStats>,

    pub elapsed: Duration,
}

/// Takes snapshots of a [`ListStore`]
///
/// Cheap to clone; clones share a cycle lock so two snapshots never
/// interleave. Without it an older capture could be renamed over a newer one
/// after the WAL was already truncated through the newer watermark.
#[derive(Clone)]
pub struct SnapshotManager {
    store: Arc<ListStore>,
    file: SnapshotFile,
    truncate_wal: bool,
    cycle_lock: Arc<Mutex<()>>,
}

impl SnapshotManager {
    pub fn new(store: Arc<ListStore>, file: SnapshotFile, truncate_wal: bool) -> Self {
        Self {
            store,
            file,
            truncate_wal,
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run one snapshot cycle synchronously
    ///
    /// Store locks are held only inside [`ListStore::capture`]; file I/O
    /// happens after they are released.
    pub fn take_snapshot(&self) -> Result<SnapshotStats> {
        let _cycle = self.cycle_lock.lock();
        let started = Instant::now();

        let record = self.store.capture();
        let bytes = self.file.write(&record)?;

        let truncated = if self.truncate_wal {
            Some(self.store.truncate_log_through(record.watermark)?)
        } else {
            None
        };

        Ok(SnapshotStats {
            watermark: record.watermark,
            lists: record.list_count(),
            elements: record.element_count(),
            bytes,
            truncated,
            elapsed: started.elapsed(),
        })
    }

    /// Start the background worker, snapshotting every `interval`
    pub fn spawn(self, interval: Duration) -> Result<SnapshotWorker> {
        if interval.is_zero() {
            return Err(ListError::Config(
                "snapshot interval must be non-zero".to_string(),
            ));
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("listkv-snapshot".to_string())
            .spawn(move || self.run(interval, stop_rx))?;

        Ok(SnapshotWorker {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn run(self, interval: Duration, stop_rx: Receiver<()>) {
        tracing::info!("Snapshot worker started (interval {:?})", interval);
        let ticker = channel::tick(interval);

        loop {
            crossbeam::select! {
                recv(ticker) -> _ => self.run_cycle(),
                // A message or a disconnected sender both mean stop
                recv(stop_rx) -> _ => break,
            }
        }

        tracing::info!("Snapshot worker stopped");
    }

    fn run_cycle(&self) {
        match self.take_snapshot() {
            Ok(stats) => tracing::debug!(
                "Snapshot written: watermark={} lists={} elements={} bytes={} in {:?}",
                stats.watermark,
                stats.lists,
                stats.elements,
                stats.bytes,
                stats.elapsed
            ),
            // Durability degrades, request handling continues
            Err(e) => tracing::error!("Snapshot failed: {}", e),
        }
    }
}

/// Handle to the background snapshot thread
///
/// Dropping the handle stops the worker and waits for it.
pub struct SnapshotWorker {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWorker {
    /// Signal the worker and wait for it to exit
    ///
    /// A cycle already in progress completes first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Snapshot worker panicked");
            }
        }
    }
}

impl Drop for SnapshotWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
