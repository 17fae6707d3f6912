//! listkv Server Binary
//!
//! Recovers the store and starts the TCP server.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use listkv::config::WalSyncStrategy;
use listkv::network::Server;
use listkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// listkv Server
#[derive(Parser, Debug)]
#[command(name = "listkv-server")]
#[command(about = "Durable keyed list store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./listkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Seconds between background snapshots (0 disables)
    #[arg(short, long, default_value = "10")]
    snapshot_interval_secs: u64,

    /// Keep WAL entries already covered by a snapshot
    #[arg(long)]
    no_truncate: bool,

    /// fsync the WAL every N entries instead of every entry
    #[arg(long)]
    sync_every: Option<usize>,
}

/// How long to wait for connection threads to release the engine
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,listkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("listkv Server v{}", listkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = match args.sync_every {
        Some(count) if count > 1 => WalSyncStrategy::EveryNEntries { count },
        _ => WalSyncStrategy::EveryWrite,
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .snapshot_interval(Duration::from_secs(args.snapshot_interval_secs))
        .truncate_wal_on_snapshot(!args.no_truncate)
        .wal_sync_strategy(sync_strategy)
        .build();

    // Recovery runs inside open, before any connection is accepted
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized with {} lists", engine.list_count());

    let server = match Server::new(config, Arc::clone(&engine)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.store(true, Ordering::Release);
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
    }
    drop(server);

    close_engine(engine);
    tracing::info!("Server stopped");
}

/// Take the final snapshot once every connection has let go of the engine
fn close_engine(mut engine: Arc<Engine>) {
    let deadline = Instant::now() + DRAIN_TIMEOUT;

    loop {
        match Arc::try_unwrap(engine) {
            Ok(engine) => {
                if let Err(e) = engine.close() {
                    tracing::error!("Failed to close engine cleanly: {}", e);
                    std::process::exit(1);
                }
                return;
            }
            Err(shared) if Instant::now() < deadline => {
                engine = shared;
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(shared) => {
                tracing::warn!("Engine still shared at shutdown; skipping final snapshot");
                if let Err(e) = shared.store().sync_log() {
                    tracing::error!("Failed to sync WAL: {}", e);
                }
                return;
            }
        }
    }
}
