//! TCP Server
//!
//! Accepts connections and runs each on its own thread.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{ListError, Result};
use crate::protocol::{write_response, Response, Status};

use super::Connection;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Open sockets, keyed by connection id, so shutdown can unblock readers
type ConnectionRegistry = Arc<Mutex<HashMap<u64, TcpStream>>>;

/// TCP server for listkv
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    connections: ConnectionRegistry,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn new(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            ListError::Network(format!("bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            engine,
            listener,
            local_addr,
            shutdown: Arc::new(AtomicBool::new(false)),
            connections: Arc::new(Mutex::new(HashMap::new())),
            workers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Flag that stops [`Server::run`] when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Number of open client connections
    pub fn active_connections(&self) -> usize {
        self.connections.lock().len()
    }

    /// Start the server (blocking until shutdown is signalled)
    ///
    /// On shutdown every open socket is closed and its thread joined.
    pub fn run(&self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr);

        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // e.g. out of file descriptors; keep serving
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        self.close_connections();
        tracing::info!("Server stopped accepting connections");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        self.workers.lock().retain(|h| !h.is_finished());

        if self.active_connections() >= self.config.max_connections {
            tracing::warn!("Rejecting {}: connection limit reached", addr);
            reject(stream);
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registered = match stream.try_clone() {
            Ok(clone) => clone,
            Err(e) => {
                tracing::warn!("Failed to register connection from {}: {}", addr, e);
                return;
            }
        };
        self.connections.lock().insert(id, registered);

        let engine = Arc::clone(&self.engine);
        let connections = Arc::clone(&self.connections);
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let spawned = thread::Builder::new()
            .name(format!("listkv-conn-{}", id))
            .spawn(move || {
                let result = Connection::new(stream, engine).and_then(|mut conn| {
                    conn.set_timeouts(read_ms, write_ms)?;
                    conn.handle()
                });
                if let Err(e) = result {
                    tracing::debug!("Connection {} from {} ended with error: {}", id, addr, e);
                }
                connections.lock().remove(&id);
            });

        match spawned {
            Ok(handle) => self.workers.lock().push(handle),
            Err(e) => {
                tracing::error!("Failed to spawn connection thread: {}", e);
                self.connections.lock().remove(&id);
            }
        }
    }

    fn close_connections(&self) {
        for stream in self.connections.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("Connection thread panicked");
            }
        }
    }
}

fn reject(stream: TcpStream) {
    let _ = stream.set_nonblocking(false);
    let mut writer = &stream;
    let _ = write_response(
        &mut writer,
        &Response::error(Status::Error, "too many connections"),
    );
    let _ = stream.shutdown(Shutdown::Both);
}
