//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and how a single
//! entry transforms list state during replay.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::ListState;

/// Operations that can be logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOp {
    /// Create an empty list
    Create,

    /// Append a value to the tail of a list
    Append,

    /// Pop the tail of a list (value is the popped element)
    Remove,
}

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The operation to perform
    pub op: LogOp,

    /// Key of the list the operation targets
    #[serde(rename = "list_id")]
    pub key: String,

    /// Appended or removed value; zero for Create
    #[serde(default)]
    pub value: i64,

    /// Logical timestamp (unix nanos) assigned when the entry was written
    pub timestamp: i64,
}

impl LogEntry {
    pub fn new(op: LogOp, key: impl Into<String>, value: i64, timestamp: i64) -> Self {
        Self {
            op,
            key: key.into(),
            value,
            timestamp,
        }
    }

    /// Serialize to one JSON line, newline included
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parse one JSON line (surrounding whitespace is ignored)
    pub fn deserialize(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Apply this entry to recovered state
    ///
    /// Replay is a pure state transformation: no validation, no locking.
    /// Remove on an empty or absent list is a no-op.
    pub fn apply(&self, lists: &mut ListState) {
        match self.op {
            LogOp::Create => {
                lists.entry(self.key.clone()).or_default();
            }
            LogOp::Append => {
                lists.entry(self.key.clone()).or_default().push(self.value);
            }
            LogOp::Remove => {
                if let Some(list) = lists.get_mut(&self.key) {
                    list.pop();
                }
            }
        }
    }
}
