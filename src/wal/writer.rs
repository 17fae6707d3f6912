//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::LogicalClock;
use crate::config::WalSyncStrategy;
use crate::error::{ListError, Result};

use super::{LogEntry, LogOp, WalReader, WalRecord};

/// Writes entries to the WAL file
///
/// Not internally synchronized: the owner keeps it behind a mutex, and the
/// timestamp is issued while that mutex is held so file order matches
/// timestamp order.
pub struct WalWriter {
    path: PathBuf,

    /// Unbuffered append handle; each entry is a single `write_all`
    file: File,

    /// File length after the last fully written entry
    committed_len: u64,

    clock: Arc<LogicalClock>,
    sync_strategy: WalSyncStrategy,

    /// Entries written since the last fsync
    uncommitted: usize,

    entries_written: u64,
    last_timestamp: i64,
}

/// Outcome of a log truncation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TruncateStats {
    /// Entries newer than the watermark, kept
    pub kept: u64,

    /// Entries at or below the watermark, dropped
    pub dropped: u64,

    /// Malformed lines dropped
    pub malformed: u64,
}

/// A log rewrite between [`WalWriter::begin_truncation`] and
/// [`WalWriter::finish_truncation`]
#[derive(Debug)]
pub struct PendingTruncation {
    log_path: PathBuf,
    tmp_path: PathBuf,

    /// Log bytes the rewrite filters; later bytes are copied unchanged
    prefix_len: u64,

    watermark: i64,
    stats: TruncateStats,
}

impl PendingTruncation {
    /// Filter the fixed prefix of the log into the temporary file
    ///
    /// Needs no access to the writer: appends only ever add bytes past the
    /// prefix, so this can run while other threads keep logging.
    pub fn rewrite_prefix(&mut self) -> Result<()> {
        let mut out = BufWriter::new(File::create(&self.tmp_path)?);

        for record in WalReader::open_prefix(&self.log_path, self.prefix_len)? {
            match record? {
                WalRecord::Entry(entry) if entry.timestamp > self.watermark => {
                    out.write_all(&entry.serialize()?)?;
                    self.stats.kept += 1;
                }
                WalRecord::Entry(_) => self.stats.dropped += 1,
                WalRecord::Malformed { line, error } => {
                    tracing::warn!(
                        "Dropping malformed WAL line {} during truncation: {}",
                        line,
                        error
                    );
                    self.stats.malformed += 1;
                }
            }
        }

        // Bulk of the data reaches disk here, outside any lock
        let file = out
            .into_inner()
            .map_err(|e| ListError::WalWrite(format!("flush truncated WAL: {}", e)))?;
        file.sync_data()?;
        Ok(())
    }

    /// Length of the filtered prefix in bytes
    pub fn prefix_len(&self) -> u64 {
        self.prefix_len
    }
}

impl WalWriter {
    /// Open or create a WAL file for appending
    ///
    /// A partial last line left by a crash is newline-terminated first, so
    /// it stays a single malformed line instead of swallowing the next entry.
    pub fn open(
        path: &Path,
        sync_strategy: WalSyncStrategy,
        clock: Arc<LogicalClock>,
    ) -> Result<Self> {
        let mut file = open_append(path)?;
        let mut committed_len = file.metadata()?.len();

        if committed_len > 0 && !ends_with_newline(path)? {
            tracing::warn!("WAL {} ends with a partial line", path.display());
            file.write_all(b"\n")?;
            file.sync_data()?;
            committed_len += 1;
        }

        let last_timestamp = clock.last();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            committed_len,
            clock,
            sync_strategy,
            uncommitted: 0,
            entries_written: 0,
            last_timestamp,
        })
    }

    /// Stamp and append one entry
    ///
    /// On any failure the file is cut back to its previous length so that an
    /// entry whose append reported an error can never be replayed.
    pub fn append(&mut self, op: LogOp, key: &str, value: i64) -> Result<LogEntry> {
        let entry = LogEntry::new(op, key, value, self.clock.tick());
        let line = entry.serialize()?;

        if let Err(e) = self.write_line(&line) {
            self.rollback();
            return Err(ListError::WalWrite(format!(
                "{:?} on list {}: {}",
                op, key, e
            )));
        }

        self.committed_len += line.len() as u64;
        self.entries_written += 1;
        self.last_timestamp = entry.timestamp;
        Ok(entry)
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line)?;

        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => {
                self.file.sync_data()?;
                self.uncommitted = 0;
            }
            WalSyncStrategy::EveryNEntries { count } => {
                if self.uncommitted + 1 >= count {
                    self.file.sync_data()?;
                    self.uncommitted = 0;
                } else {
                    self.uncommitted += 1;
                }
            }
        }

        Ok(())
    }

    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.committed_len) {
            tracing::error!(
                "Failed to roll back WAL {} to {} bytes: {}",
                self.path.display(),
                self.committed_len,
                e
            );
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Rewrite the log keeping only entries newer than `watermark`
    ///
    /// Runs all three truncation phases back to back. Callers sharing the
    /// writer behind a mutex should use [`begin_truncation`] and
    /// [`finish_truncation`] instead and filter the prefix unlocked.
    ///
    /// [`begin_truncation`]: WalWriter::begin_truncation
    /// [`finish_truncation`]: WalWriter::finish_truncation
    pub fn truncate_through(&mut self, watermark: i64) -> Result<TruncateStats> {
        let mut pending = self.begin_truncation(watermark)?;
        pending.rewrite_prefix()?;
        self.finish_truncation(pending)
    }

    /// Fix the part of the log a truncation will filter
    ///
    /// Syncs the log and records its current length. Entries appended after
    /// this call land past that length and are carried over verbatim. At most
    /// one truncation may be in flight per writer.
    pub fn begin_truncation(&mut self, watermark: i64) -> Result<PendingTruncation> {
        self.sync()?;

        Ok(PendingTruncation {
            log_path: self.path.clone(),
            tmp_path: tmp_path_for(&self.path),
            prefix_len: self.committed_len,
            watermark,
            stats: TruncateStats::default(),
        })
    }

    /// Carry over entries appended since [`begin_truncation`] and swap the
    /// rewritten log in
    ///
    /// The rewrite goes to a temporary file that atomically replaces the log,
    /// so a crash mid-truncation leaves the old log intact.
    ///
    /// [`begin_truncation`]: WalWriter::begin_truncation
    pub fn finish_truncation(&mut self, pending: PendingTruncation) -> Result<TruncateStats> {
        let PendingTruncation {
            tmp_path,
            prefix_len,
            mut stats,
            ..
        } = pending;

        let mut tail = Vec::new();
        {
            let mut log = File::open(&self.path)?;
            log.seek(SeekFrom::Start(prefix_len))?;
            log.take(self.committed_len.saturating_sub(prefix_len))
                .read_to_end(&mut tail)?;
        }

        let mut out = OpenOptions::new().append(true).open(&tmp_path)?;
        out.write_all(&tail)?;
        out.sync_all()?;
        stats.kept += tail.iter().filter(|&&b| b == b'\n').count() as u64;

        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        self.file = open_append(&self.path)?;
        self.committed_len = self.file.metadata()?.len();
        self.uncommitted = 0;

        Ok(stats)
    }

    /// Get the number of entries written since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Get the number of entries appended through this writer
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Timestamp of the last appended entry (clock floor if none yet)
    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    /// Current log length in bytes
    pub fn len_bytes(&self) -> u64 {
        self.committed_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// `log.jsonl` → `log.jsonl.tmp`
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Persist a rename by syncing the containing directory (Unix only)
pub(crate) fn sync_parent_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            let dir = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            File::open(dir)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
