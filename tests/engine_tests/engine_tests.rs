//! Tests for Engine
//!
//! These tests verify:
//! - Basic create/append/get/remove/size operations
//! - Command execution
//! - Crash recovery from WAL, with and without snapshots
//! - Background snapshot worker
//! - Engine lifecycle (open/close)

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use listkv::config::{Config, WalSyncStrategy};
use listkv::engine::Engine;
use listkv::protocol::Command;
use listkv::wal::{WalReader, WalRecord};
use listkv::ErrorKind;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .snapshot_interval(Duration::ZERO)
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(temp_dir.path())).unwrap();
    (temp_dir, engine)
}

fn log_entry_count(dir: &Path) -> usize {
    WalReader::open(&dir.join("log.jsonl"))
        .unwrap()
        .filter(|r| matches!(r, Ok(WalRecord::Entry(_))))
        .count()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _engine = Engine::open(test_config(&data_dir)).unwrap();

    assert!(data_dir.exists());
    assert!(data_dir.join("log.jsonl").exists());
    assert!(!data_dir.join("snapshot.json").exists());
}

#[test]
fn test_engine_list_operations() {
    let (_temp, engine) = setup_temp_engine();

    engine.create("A").unwrap();
    engine.append("A", 1).unwrap();
    engine.append("A", 2).unwrap();

    assert_eq!(engine.get("A", 0).unwrap(), 1);
    assert_eq!(engine.get("A", 1).unwrap(), 2);
    assert_eq!(engine.size("A"), 2);

    assert_eq!(engine.remove("A").unwrap(), 2);
    assert_eq!(engine.items("A").unwrap(), vec![1]);
    assert_eq!(engine.keys(), vec!["A"]);
    assert_eq!(engine.list_count(), 1);
}

#[test]
fn test_engine_error_kinds() {
    let (_temp, engine) = setup_temp_engine();
    engine.create("A").unwrap();

    assert_eq!(engine.create("A").unwrap_err().kind(), ErrorKind::AlreadyExists);
    assert_eq!(engine.append("B", 1).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(engine.get("A", 0).unwrap_err().kind(), ErrorKind::InvalidIndex);
    assert_eq!(engine.remove("A").unwrap_err().kind(), ErrorKind::EmptyList);
    assert_eq!(engine.size("B"), 0);
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_execute_commands() {
    let (_temp, engine) = setup_temp_engine();

    let create = Command::Create { key: "A".to_string() };
    let append = |value| Command::Append { key: "A".to_string(), value };

    assert_eq!(engine.execute(create.clone()).unwrap(), None);
    assert_eq!(engine.execute(append(10)).unwrap(), None);
    assert_eq!(engine.execute(append(20)).unwrap(), None);

    let get = Command::Get { key: "A".to_string(), index: 1 };
    assert_eq!(engine.execute(get).unwrap(), Some(20));

    let size = Command::Size { key: "A".to_string() };
    assert_eq!(engine.execute(size).unwrap(), Some(2));

    let remove = Command::Remove { key: "A".to_string() };
    assert_eq!(engine.execute(remove).unwrap(), Some(20));

    assert_eq!(engine.execute(Command::Ping).unwrap(), None);

    let err = engine.execute(create).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_execute_size_of_absent_key() {
    let (_temp, engine) = setup_temp_engine();

    let size = Command::Size { key: "nobody".to_string() };
    assert_eq!(engine.execute(size).unwrap(), Some(0));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_engine_crash_recovery() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(test_config(temp_dir.path())).unwrap();
        engine.create("A").unwrap();
        engine.append("A", 1).unwrap();
        engine.append("A", 2).unwrap();
        engine.create("B").unwrap();
        engine.append("B", 10).unwrap();
        engine.remove("B").unwrap();
        // Dropped without close: no final snapshot
    }

    let engine = Engine::open(test_config(temp_dir.path())).unwrap();

    assert_eq!(engine.items("A").unwrap(), vec![1, 2]);
    assert_eq!(engine.items("B").unwrap(), Vec::<i64>::new());
    assert!(!engine.recovery_stats().snapshot_loaded);
    assert_eq!(engine.recovery_stats().entries_replayed, 6);
}

#[test]
fn test_crash_after_snapshot_replays_only_newer_entries() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(test_config(temp_dir.path())).unwrap();
        engine.create("A").unwrap();
        engine.append("A", 1).unwrap();
        engine.snapshot().unwrap();

        engine.append("A", 2).unwrap();
        engine.append("A", 3).unwrap();
    }

    let engine = Engine::open(test_config(temp_dir.path())).unwrap();

    assert_eq!(engine.items("A").unwrap(), vec![1, 2, 3]);
    let stats = engine.recovery_stats();
    assert!(stats.snapshot_loaded);
    assert_eq!(stats.entries_replayed, 2);
    assert_eq!(stats.entries_corrupted, 0);
}

#[test]
fn test_snapshot_without_truncation_skips_covered_entries() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .snapshot_interval(Duration::ZERO)
        .truncate_wal_on_snapshot(false)
        .build();

    {
        let engine = Engine::open(config.clone()).unwrap();
        engine.create("A").unwrap();
        engine.append("A", 1).unwrap();
        engine.snapshot().unwrap();
        engine.append("A", 2).unwrap();
    }

    assert_eq!(log_entry_count(temp_dir.path()), 3);

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.items("A").unwrap(), vec![1, 2]);
    assert_eq!(engine.recovery_stats().entries_skipped, 2);
    assert_eq!(engine.recovery_stats().entries_replayed, 1);
}

#[test]
fn test_clock_resumes_past_recovered_history() {
    let temp_dir = TempDir::new().unwrap();

    let last_before = {
        let engine = Engine::open(test_config(temp_dir.path())).unwrap();
        engine.create("A").unwrap();
        engine.append("A", 1).unwrap();
        engine.store().clock().last()
    };

    let engine = Engine::open(test_config(temp_dir.path())).unwrap();
    assert!(engine.store().clock().last() >= last_before);

    engine.append("A", 2).unwrap();
    assert!(engine.store().clock().last() > last_before);
}

#[test]
fn test_repeated_reopen_is_stable() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(test_config(temp_dir.path())).unwrap();
        engine.create("A").unwrap();
        engine.append("A", 1).unwrap();
        engine.snapshot().unwrap();
        engine.append("A", 2).unwrap();
    }

    for _ in 0..3 {
        let engine = Engine::open(test_config(temp_dir.path())).unwrap();
        assert_eq!(engine.items("A").unwrap(), vec![1, 2]);
    }
}

#[test]
fn test_corrupt_snapshot_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("snapshot.json"), "][").unwrap();

    let err = Engine::open(test_config(temp_dir.path())).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_close_writes_final_snapshot_and_truncates() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(test_config(temp_dir.path())).unwrap();
        engine.create("A").unwrap();
        engine.append("A", 1).unwrap();
        engine.close().unwrap();
    }

    assert!(temp_dir.path().join("snapshot.json").exists());
    assert_eq!(log_entry_count(temp_dir.path()), 0);

    let engine = Engine::open(test_config(temp_dir.path())).unwrap();
    assert_eq!(engine.items("A").unwrap(), vec![1]);
    assert!(engine.recovery_stats().snapshot_loaded);
    assert_eq!(engine.recovery_stats().entries_replayed, 0);
    assert_eq!(engine.wal_len_bytes(), 0);
}

#[test]
fn test_close_syncs_log_when_final_snapshot_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 1000 })
        .snapshot_interval(Duration::ZERO)
        .build();

    let engine = Engine::open(config.clone()).unwrap();
    engine.create("A").unwrap();
    engine.append("A", 1).unwrap();

    let store = Arc::clone(engine.store());
    assert_eq!(store.log_uncommitted(), 2);

    // A directory in the way of the snapshot's temp file makes the write fail
    let blocker = temp_dir.path().join("snapshot.json.tmp");
    fs::create_dir(&blocker).unwrap();

    let err = engine.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert_eq!(store.log_uncommitted(), 0);
    assert!(!temp_dir.path().join("snapshot.json").exists());
    assert_eq!(log_entry_count(temp_dir.path()), 2);

    drop(store);
    fs::remove_dir(&blocker).unwrap();

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.items("A").unwrap(), vec![1]);
    assert_eq!(engine.recovery_stats().entries_replayed, 2);
}

#[test]
fn test_background_worker_snapshots() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .snapshot_interval(Duration::from_millis(20))
        .build();

    let engine = Engine::open(config).unwrap();
    assert!(engine.snapshot_worker_running());

    engine.create("A").unwrap();
    engine.append("A", 1).unwrap();

    // Wait until a cycle has covered both entries and truncated them
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.wal_len_bytes() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(engine.wal_len_bytes(), 0);
    assert!(temp_dir.path().join("snapshot.json").exists());

    engine.close().unwrap();
}

#[test]
fn test_zero_interval_disables_worker() {
    let (_temp, engine) = setup_temp_engine();
    assert!(!engine.snapshot_worker_running());
}

#[test]
fn test_open_path_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();

    assert_eq!(engine.data_dir(), temp_dir.path());
    assert_eq!(engine.config().wal_sync_strategy, WalSyncStrategy::EveryWrite);
    assert!(engine.snapshot_worker_running());

    engine.close().unwrap();
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_clients_then_recover() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .snapshot_interval(Duration::from_millis(5))
        .build();

    {
        let engine = Arc::new(Engine::open(config.clone()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let key = format!("client{}", t);
                    engine.create(&key).unwrap();
                    for i in 0..200 {
                        engine.append(&key, i).unwrap();
                    }
                    for _ in 0..50 {
                        engine.remove(&key).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        // Crash: no close, worker stopped by drop
    }

    let engine = Engine::open(test_config(temp_dir.path())).unwrap();
    assert_eq!(engine.list_count(), 4);
    for t in 0..4 {
        let key = format!("client{}", t);
        assert_eq!(engine.items(&key).unwrap(), (0..150).collect::<Vec<i64>>());
    }
}
