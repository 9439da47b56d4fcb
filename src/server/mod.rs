//! TCP server: accept loop, executor, lifecycle.
//!
//! Thread layout: the caller's thread accepts connections and assigns
//! strictly increasing session ids; each connection gets a detached reader
//! thread; a single executor thread owns the [`Store`] and resolves queries
//! popped from the shared [`WorkQueue`]; an optional autosnap worker
//! enqueues snapshot requests. All snapshot writes happen on the executor
//! thread, so the store needs no lock and saves cannot race.
//!
//! `DOWN` performs a final synchronous snapshot, flips the shutdown flag,
//! and wakes the acceptor with a loopback connection so it can exit.

pub mod connection;
pub mod queue;
pub mod resolver;
pub mod session;

use crate::config::{EPHEMERAL_PORT_RANGE, SOCKET_DEADLINE_MS, STORAGE_EXTENSION, TLS_DEFAULT_PORT};
use crate::snapshot::autosnap::{AutosnapConfig, AutosnapWorker};
use crate::snapshot::{self, SnapshotError};
use crate::store::Store;
use crate::verbosity::{LEVEL_NOISY, LEVEL_WARNINGS};
use crate::vlog;
use connection::ConnectionParams;
use queue::{Work, WorkQueue};
use rand::Rng;
use resolver::{Outcome, ResolverCtx};
use session::Registry;
use std::fmt;
use std::fs;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Fatal startup failures; the binary maps any of these to exit code 1.
#[derive(Debug)]
pub enum ServerError {
    /// New database without `--db-size`.
    CapacityUndefined,
    /// The storage path exists but cannot be inspected as a regular file.
    StatCorrupted(io::Error),
    /// The storage file could not be created.
    OpenFailed(io::Error),
    /// The snapshot could not be read back.
    LoadFailed(SnapshotError),
    /// The snapshot does not fit the configured capacity.
    SpaceLimitExceeded,
    /// No listen address could be bound.
    BindFailed(io::Error),
    /// A required thread could not be spawned.
    SpawnFailed(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::CapacityUndefined => write!(f, "capacity undefined"),
            ServerError::StatCorrupted(e) => write!(f, "stat corrupted: {e}"),
            ServerError::OpenFailed(e) => write!(f, "open failed: {e}"),
            ServerError::LoadFailed(e) => write!(f, "load failed: {e}"),
            ServerError::SpaceLimitExceeded => write!(f, "space limit exceeded"),
            ServerError::BindFailed(e) => write!(f, "bind failed: {e}"),
            ServerError::SpawnFailed(e) => write!(f, "thread spawn failed: {e}"),
        }
    }
}

impl std::error::Error for ServerError {}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server parameters, normally built from the CLI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database name; also names the storage file.
    pub name: String,
    /// Listen address; `None` selects the default per the `tls` flag.
    pub addr: Option<SocketAddr>,
    /// Directory holding the storage file.
    pub db_path: String,
    /// Autosnap thresholds; `None` disables periodic snapshots.
    pub save: Option<AutosnapConfig>,
    /// Encrypt sessions.
    pub tls: bool,
    /// Password for session auth. Implies `tls`; the server upgrades
    /// silently rather than rejecting the configuration.
    pub auth: Option<Vec<u8>>,
    /// Capacity budget in bytes; required unless the storage file exists.
    pub db_size: Option<u64>,
    /// Per-frame socket deadline in milliseconds.
    pub deadline_ms: u64,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        ServerConfig {
            name: name.into(),
            addr: None,
            db_path: ".".into(),
            save: None,
            tls: false,
            auth: None,
            db_size: None,
            deadline_ms: SOCKET_DEADLINE_MS,
        }
    }
}

/// Resolves `<db_path>/<name>.raptodb`, normalizing backslashes.
pub fn storage_path(db_path: &str, name: &str) -> PathBuf {
    let normalized = db_path.replace('\\', "/");
    PathBuf::from(normalized).join(format!("{name}{STORAGE_EXTENSION}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// A bound server, ready to run.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Store,
    path: PathBuf,
    params: ConnectionParams,
    save: Option<AutosnapConfig>,
}

impl Server {
    /// Opens (or creates) the storage file, loads the snapshot, and binds
    /// the listen socket.
    pub fn bind(mut cfg: ServerConfig) -> Result<Self, ServerError> {
        if cfg.auth.is_some() && !cfg.tls {
            vlog!(LEVEL_WARNINGS, "auth requires encryption; enabling tls");
            cfg.tls = true;
        }

        let path = storage_path(&cfg.db_path, &cfg.name);
        let capacity = match fs::metadata(&path) {
            Ok(md) if md.is_file() => md.len().max(cfg.db_size.unwrap_or(0)),
            Ok(_) => {
                return Err(ServerError::StatCorrupted(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "storage path is not a regular file",
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let requested = cfg.db_size.ok_or(ServerError::CapacityUndefined)?;
                fs::File::create(&path).map_err(ServerError::OpenFailed)?;
                requested
            }
            Err(e) => return Err(ServerError::StatCorrupted(e)),
        };

        let mut store = Store::new(cfg.name.clone(), capacity);
        let loaded = snapshot::load(&path, &mut store).map_err(|e| match e {
            SnapshotError::SpaceLimit => ServerError::SpaceLimitExceeded,
            other => ServerError::LoadFailed(other),
        })?;
        store.prefetch();
        vlog!(
            LEVEL_NOISY,
            "db {:?}: loaded {loaded} objects, {} of {} bytes free",
            cfg.name,
            store.cap_remaining(),
            store.capacity()
        );

        let listener = match cfg.addr {
            Some(addr) => TcpListener::bind(addr).map_err(ServerError::BindFailed)?,
            None if cfg.tls => TcpListener::bind((Ipv4Addr::LOCALHOST, TLS_DEFAULT_PORT))
                .map_err(ServerError::BindFailed)?,
            None => bind_ephemeral()?,
        };
        let local_addr = listener.local_addr().map_err(ServerError::BindFailed)?;
        vlog!(LEVEL_NOISY, "listening on {local_addr}");

        Ok(Server {
            listener,
            local_addr,
            store,
            path,
            params: ConnectionParams {
                tls: cfg.tls,
                auth: cfg.auth,
                deadline_ms: cfg.deadline_ms,
            },
            save: cfg.save,
        })
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until a `DOWN` query shuts the server down.
    pub fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            local_addr,
            mut store,
            path,
            params,
            save,
        } = self;

        let queue = Arc::new(WorkQueue::new());
        let registry = Arc::new(Registry::new());
        let modifications = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let executor = {
            let queue = Arc::clone(&queue);
            let modifications = Arc::clone(&modifications);
            let shutdown = Arc::clone(&shutdown);
            let path = path.clone();
            let persistence = save.is_some();
            thread::Builder::new()
                .name("executor".into())
                .spawn(move || {
                    executor_loop(
                        &mut store,
                        &queue,
                        &path,
                        &modifications,
                        persistence,
                        &shutdown,
                        local_addr,
                    );
                })
                .map_err(ServerError::SpawnFailed)?
        };

        let autosnap = match save {
            Some(cfg) => Some(
                AutosnapWorker::spawn(cfg, Arc::clone(&modifications), Arc::clone(&queue))
                    .map_err(ServerError::SpawnFailed)?,
            ),
            None => None,
        };

        let params = Arc::new(params);
        let mut next_id: u64 = 1;
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let id = next_id;
                    next_id += 1;
                    let params = Arc::clone(&params);
                    let registry = Arc::clone(&registry);
                    let queue = Arc::clone(&queue);
                    let spawned = thread::Builder::new()
                        .name(format!("conn-{id}"))
                        .spawn(move || {
                            connection::handle(stream, id, &params, &registry, &queue);
                        });
                    if let Err(e) = spawned {
                        vlog!(LEVEL_WARNINGS, "connection thread spawn failed: {e}");
                    }
                }
                Err(e) => {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    vlog!(LEVEL_WARNINGS, "accept failed: {e}");
                }
            }
        }

        let _ = executor.join();
        if let Some(worker) = autosnap {
            worker.stop();
        }
        vlog!(LEVEL_NOISY, "server stopped");
        Ok(())
    }
}

/// Binds a random loopback port in the ephemeral range.
fn bind_ephemeral() -> Result<TcpListener, ServerError> {
    let mut rng = rand::thread_rng();
    let mut last_err: Option<io::Error> = None;
    for _ in 0..16 {
        let port = rng.gen_range(EPHEMERAL_PORT_RANGE);
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(listener) => return Ok(listener),
            Err(e) => last_err = Some(e),
        }
    }
    Err(ServerError::BindFailed(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrInUse, "ephemeral port range exhausted")
    })))
}

/// Convenience wrapper: bind then run.
pub fn run(cfg: ServerConfig) -> Result<(), ServerError> {
    Server::bind(cfg)?.run()
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor
// ─────────────────────────────────────────────────────────────────────────────

/// Pops and resolves work until shutdown. The store lives on this thread;
/// no other thread touches it.
fn executor_loop(
    store: &mut Store,
    queue: &WorkQueue,
    path: &Path,
    modifications: &AtomicU64,
    persistence: bool,
    shutdown: &AtomicBool,
    wake_addr: SocketAddr,
) {
    loop {
        match queue.wait_and_pop() {
            Work::Query(q) => {
                let mut ctx = ResolverCtx {
                    store: &mut *store,
                    snapshot_path: path,
                };
                match resolver::resolve(&mut ctx, &q.line) {
                    Ok(Outcome::Payload(payload)) => {
                        if persistence {
                            modifications.fetch_add(1, Ordering::SeqCst);
                        }
                        if let Err(e) = q.client.respond(&payload) {
                            vlog!(
                                LEVEL_WARNINGS,
                                "client {}: response failed: {e}",
                                q.client.id()
                            );
                        }
                    }
                    Ok(Outcome::Shutdown) => {
                        vlog!(LEVEL_NOISY, "shutdown requested; writing final snapshot");
                        if let Err(e) = snapshot::save(path, store) {
                            vlog!(LEVEL_WARNINGS, "final snapshot failed: {e}");
                        }
                        shutdown.store(true, Ordering::SeqCst);
                        // Wake the acceptor blocked in accept().
                        let _ = TcpStream::connect(wake_addr);
                        break;
                    }
                    Err(err) => {
                        let _ = q.client.respond(&err.response());
                    }
                }
            }
            Work::Autosnap => match snapshot::save(path, store) {
                Ok(()) => {
                    modifications.store(0, Ordering::SeqCst);
                    vlog!(LEVEL_NOISY, "autosnap: snapshot written");
                }
                Err(e) => vlog!(LEVEL_WARNINGS, "autosnap: save failed: {e}"),
            },
        }
    }
}
