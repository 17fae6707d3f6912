//! Concurrency tests for ListStore
//!
//! These tests verify:
//! - Independent keys proceed in parallel without lost updates
//! - Same-key mutations serialize
//! - Captures never observe a half-applied mutation
//! - Capture + newer WAL entries reproduce the live state
//! - Log truncation does not hold up other writers or readers

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use listkv::clock::LogicalClock;
use listkv::config::WalSyncStrategy;
use listkv::snapshot::SnapshotRecord;
use listkv::store::{ListState, ListStore};
use listkv::wal::{WalReader, WalRecord, WalWriter};
use listkv::ErrorKind;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> (TempDir, PathBuf, Arc<ListStore>) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("log.jsonl");
    let clock = Arc::new(LogicalClock::new());
    let wal = WalWriter::open(
        &wal_path,
        WalSyncStrategy::EveryNEntries { count: 10_000 },
        Arc::clone(&clock),
    )
    .unwrap();
    let store = Arc::new(ListStore::new(ListState::new(), wal, clock));
    (temp_dir, wal_path, store)
}

fn live_state(store: &ListStore) -> ListState {
    store
        .keys()
        .into_iter()
        .map(|key| {
            let items = store.items(&key).unwrap();
            (key, items)
        })
        .collect()
}

/// What recovery would rebuild from `record` plus the log at `wal_path`
fn replay_onto(record: &SnapshotRecord, wal_path: &Path) -> ListState {
    let mut state = record.lists.clone();
    for result in WalReader::open(wal_path).unwrap() {
        if let WalRecord::Entry(entry) = result.unwrap() {
            if entry.timestamp > record.watermark {
                entry.apply(&mut state);
            }
        }
    }
    state
}

// =============================================================================
// Parallel Mutation Tests
// =============================================================================

#[test]
fn test_parallel_appends_to_distinct_keys() {
    let (_temp, _wal, store) = setup_store();
    const THREADS: usize = 8;
    const PER_THREAD: i64 = 500;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let key = format!("key{}", t);
                store.create(&key).unwrap();
                for i in 0..PER_THREAD {
                    store.append(&key, i).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.list_count(), THREADS);
    for t in 0..THREADS {
        let key = format!("key{}", t);
        assert_eq!(store.items(&key).unwrap(), (0..PER_THREAD).collect::<Vec<_>>());
    }
}

#[test]
fn test_parallel_appends_to_same_key() {
    let (_temp, _wal, store) = setup_store();
    store.create("shared").unwrap();
    const THREADS: i64 = 8;
    const PER_THREAD: i64 = 250;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    store.append("shared", t * PER_THREAD + i).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut items = store.items("shared").unwrap();
    assert_eq!(items.len() as i64, THREADS * PER_THREAD);

    items.sort_unstable();
    assert_eq!(items, (0..THREADS * PER_THREAD).collect::<Vec<_>>());
}

#[test]
fn test_racing_creates_exactly_one_wins() {
    let (_temp, _wal, store) = setup_store();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.create("contested"))
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(()) => wins += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists),
        }
    }
    assert_eq!(wins, 1);
}

#[test]
fn test_concurrent_removes_pop_each_value_once() {
    let (_temp, _wal, store) = setup_store();
    store.create("stack").unwrap();
    for i in 0..1000 {
        store.append("stack", i).unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut popped = Vec::new();
                loop {
                    match store.remove("stack") {
                        Ok(v) => popped.push(v),
                        Err(e) => {
                            assert_eq!(e.kind(), ErrorKind::EmptyList);
                            return popped;
                        }
                    }
                }
            })
        })
        .collect();

    let mut all: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();

    assert_eq!(all, (0..1000).collect::<Vec<_>>());
    assert_eq!(store.size("stack"), 0);
}

#[test]
fn test_readers_see_valid_lengths_during_appends() {
    let (_temp, _wal, store) = setup_store();
    store.create("grow").unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..2000 {
                store.append("grow", i).unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last_size = 0;
            while !done.load(Ordering::Acquire) {
                let size = store.size("grow");
                assert!(size >= last_size, "size went backwards");
                if size > 0 {
                    // Element i was appended as value i
                    let last = (size - 1) as i64;
                    assert_eq!(store.get("grow", last).unwrap(), last);
                }
                last_size = size;
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.size("grow"), 2000);
}

// =============================================================================
// Capture Consistency Tests
// =============================================================================

#[test]
fn test_capture_never_sees_torn_lists() {
    let (_temp, wal_path, store) = setup_store();
    const WRITERS: usize = 4;
    const PER_WRITER: i64 = 300;

    for w in 0..WRITERS {
        store.create(&format!("w{}", w)).unwrap();
    }

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let key = format!("w{}", w);
                for i in 0..PER_WRITER {
                    store.append(&key, i).unwrap();
                    if i % 3 == 2 {
                        assert_eq!(store.remove(&key).unwrap(), i);
                        store.append(&key, i).unwrap();
                    }
                }
            })
        })
        .collect();

    let capturer = {
        let store = Arc::clone(&store);
        thread::spawn(move || (0..100).map(|_| store.capture()).collect::<Vec<_>>())
    };

    for handle in writers {
        handle.join().unwrap();
    }
    let captures = capturer.join().unwrap();

    // Every list is always a prefix of 0, 1, 2, ...
    for record in &captures {
        for (key, items) in &record.lists {
            let expected: Vec<i64> = (0..items.len() as i64).collect();
            assert_eq!(items, &expected, "torn list {} at {}", key, record.watermark);
        }
    }

    for pair in captures.windows(2) {
        assert!(pair[0].watermark < pair[1].watermark);
    }

    // Capture + newer log entries reproduce the final state
    let final_state = live_state(&store);
    for record in &captures {
        assert_eq!(replay_onto(record, &wal_path), final_state);
    }
}

#[test]
fn test_capture_during_creates() {
    let (_temp, wal_path, store) = setup_store();

    let creator = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200 {
                let key = format!("k{:03}", i);
                store.create(&key).unwrap();
                store.append(&key, i).unwrap();
            }
        })
    };

    let capturer = {
        let store = Arc::clone(&store);
        thread::spawn(move || (0..50).map(|_| store.capture()).collect::<Vec<_>>())
    };

    creator.join().unwrap();
    let captures = capturer.join().unwrap();

    let final_state = live_state(&store);
    assert_eq!(final_state.len(), 200);
    for record in &captures {
        assert_eq!(replay_onto(record, &wal_path), final_state);
    }
}

// =============================================================================
// Log Truncation Tests
// =============================================================================

/// Entries logged ahead of a truncation, enough to keep it busy for a while
const BACKLOG: i64 = 200_000;

fn fill_log(store: &ListStore, key: &str) {
    store.create(key).unwrap();
    for i in 0..BACKLOG {
        store.append(key, i).unwrap();
    }
}

/// Start truncating through `watermark`; the flag drops once it is done
fn spawn_truncation(
    store: &Arc<ListStore>,
    watermark: i64,
) -> (Arc<AtomicBool>, thread::JoinHandle<Duration>) {
    let running = Arc::new(AtomicBool::new(true));
    let handle = {
        let store = Arc::clone(store);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let started = Instant::now();
            store.truncate_log_through(watermark).unwrap();
            running.store(false, Ordering::SeqCst);
            started.elapsed()
        })
    };
    (running, handle)
}

#[test]
fn test_truncation_keeps_entries_logged_while_it_runs() {
    let (_temp, wal_path, store) = setup_store();
    fill_log(&store, "big");
    store.create("live").unwrap();

    let record = store.capture();
    let (running, truncation) = spawn_truncation(&store, record.watermark);

    let mut appended = 0i64;
    while running.load(Ordering::SeqCst) || appended < 100 {
        store.append("live", appended).unwrap();
        appended += 1;
    }
    truncation.join().unwrap();

    // Only the appends made after the capture survive, none lost
    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .map(|r| match r.unwrap() {
            WalRecord::Entry(entry) => entry,
            WalRecord::Malformed { line, error } => panic!("malformed line {}: {}", line, error),
        })
        .collect();
    assert_eq!(entries.len() as i64, appended);
    assert!(entries.iter().all(|e| e.timestamp > record.watermark));
    assert!(entries.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    assert_eq!(replay_onto(&record, &wal_path), live_state(&store));
    assert_eq!(store.items("live").unwrap(), (0..appended).collect::<Vec<_>>());
}

#[test]
fn test_appends_not_stalled_by_truncation() {
    let (_temp, _wal, store) = setup_store();
    fill_log(&store, "big");
    store.create("other").unwrap();

    let watermark = store.capture().watermark;
    let (running, truncation) = spawn_truncation(&store, watermark);

    let mut worst = Duration::ZERO;
    let mut value = 0;
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        store.append("other", value).unwrap();
        worst = worst.max(started.elapsed());
        value += 1;
    }
    let took = truncation.join().unwrap();

    // Too fast a machine to tell a stall from noise
    if took >= Duration::from_millis(40) {
        assert!(worst < took / 2, "append waited {:?} on a {:?} truncation", worst, took);
    }
}

#[test]
fn test_size_not_blocked_by_create_during_truncation() {
    let (_temp, _wal, store) = setup_store();
    fill_log(&store, "big");
    store.create("other").unwrap();

    let watermark = store.capture().watermark;
    let (running, truncation) = spawn_truncation(&store, watermark);

    let creator = {
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut created = 0;
            while running.load(Ordering::SeqCst) {
                store.create(&format!("new{}", created)).unwrap();
                created += 1;
            }
            created
        })
    };

    let mut worst = Duration::ZERO;
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        assert_eq!(store.size("other"), 0);
        worst = worst.max(started.elapsed());
    }
    let took = truncation.join().unwrap();
    let created = creator.join().unwrap();

    assert_eq!(store.list_count(), 2 + created);
    if took >= Duration::from_millis(40) {
        assert!(worst < took / 2, "size waited {:?} on a {:?} truncation", worst, took);
    }
}
