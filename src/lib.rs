//! # listkv
//!
//! A durable keyed list store with:
//! - Per-key locking over independently growable integer lists
//! - Write-Ahead Logging (WAL) of every accepted mutation
//! - Periodic snapshots with watermark-based WAL truncation
//! - Deterministic crash recovery (snapshot + newer WAL entries)
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │        (recovery at open, snapshot worker lifecycle)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     ListStore                                │
//! │        (directory lock + per-key RwLock<ListSlot>)           │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ append before ack                │ capture
//!            ▼                                  ▼
//!   ┌─────────────────┐              ┌─────────────────────┐
//!   │       WAL       │◄─ truncate ──│  SnapshotManager    │
//!   │  (log.jsonl)    │              │  (snapshot.json)    │
//!   └────────┬────────┘              └──────────┬──────────┘
//!            │                                  │
//!            └──────────► Recovery ◄────────────┘
//!                      (startup only)
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod clock;

pub mod wal;
pub mod store;
pub mod snapshot;
pub mod recovery;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, ListError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of listkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
