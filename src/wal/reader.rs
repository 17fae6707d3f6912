//! WAL Reader
//!
//! Handles reading entries from the WAL file, one JSON object per line.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Take};
use std::path::Path;

use crate::error::Result;
use super::LogEntry;

/// One non-empty line of the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// A well-formed entry
    Entry(LogEntry),

    /// A line that failed to parse (torn tail, bad UTF-8, unknown op, ...)
    Malformed { line: usize, error: String },
}

/// Reads entries from the WAL file
///
/// I/O errors surface as `Err`; parse failures surface as
/// [`WalRecord::Malformed`] so the caller decides whether they are fatal.
pub struct WalReader {
    reader: BufReader<Take<File>>,
    line_number: usize,
    buf: Vec<u8>,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_prefix(path, u64::MAX)
    }

    /// Open a WAL file, reading no further than its first `len` bytes
    ///
    /// Bytes appended past `len` while reading are never seen.
    pub fn open_prefix(path: &Path, len: u64) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file.take(len)),
            line_number: 0,
            buf: Vec::new(),
        })
    }

    /// Read the next non-empty line from the WAL
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text.trim_end_matches(['\n', '\r']),
                Err(e) => {
                    return Ok(Some(WalRecord::Malformed {
                        line: self.line_number,
                        error: e.to_string(),
                    }))
                }
            };

            if text.trim().is_empty() {
                continue;
            }

            let record = match LogEntry::deserialize(text) {
                Ok(entry) => WalRecord::Entry(entry),
                Err(e) => WalRecord::Malformed {
                    line: self.line_number,
                    error: e.to_string(),
                },
            };
            return Ok(Some(record));
        }
    }

    /// Line number of the last line read (1-based)
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for WalReader {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
