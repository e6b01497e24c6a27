use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use crate::clock::Clock;
use crate::codec::{self, Reader, Writer};
use crate::commands::{self, Registry, Request};
use crate::logger::{Logger, TracingLogger};
use crate::session::Session;
use crate::store::{Stats, Store};

/// How often the background sweeper evicts expired keys.
const SWEEP_INTERVAL: Duration = Duration::from_millis(200);

/// Shared server state: the command registry, the simulated clock, and the
/// per-database keyspaces, created lazily on first reference.
pub struct Server {
    keyspaces: RwLock<HashMap<usize, Arc<Store>>>,
    clock: Arc<Clock>,
    registry: Registry,
    log: Arc<dyn Logger>,
}

impl Server {
    /// Fails fast if the command table cannot be assembled (duplicate
    /// registration).
    pub fn new(clock: Arc<Clock>, log: Arc<dyn Logger>) -> crate::Result<Server> {
        Ok(Server {
            keyspaces: RwLock::new(HashMap::new()),
            clock,
            registry: Registry::build()?,
            log,
        })
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current simulated time; handlers pass this into every store call.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Seconds since the clock base, per the simulated clock.
    pub fn uptime_secs(&self, now: SystemTime) -> u64 {
        now.duration_since(self.clock.base())
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    /// The keyspace a session's commands operate on.
    pub fn keyspace_for(&self, session: &Session) -> Arc<Store> {
        self.keyspace(session.selected_db)
    }

    /// Double-checked lazy creation: most lookups hit the shared lock only.
    pub fn keyspace(&self, index: usize) -> Arc<Store> {
        if let Some(store) = self.keyspaces.read().unwrap().get(&index) {
            return store.clone();
        }
        let mut keyspaces = self.keyspaces.write().unwrap();
        keyspaces
            .entry(index)
            .or_insert_with(|| Arc::new(Store::new()))
            .clone()
    }

    /// Per-keyspace counters, ascending by database index.
    pub fn keyspace_stats(&self, now: SystemTime) -> Vec<(usize, Stats)> {
        let keyspaces = self.keyspaces.read().unwrap();
        let mut stats: Vec<_> = keyspaces
            .iter()
            .map(|(index, store)| (*index, store.stats(now)))
            .collect();
        stats.sort_by_key(|(index, _)| *index);
        stats
    }

    /// Evicts expired entries from every keyspace.
    pub fn clean_up_expired(&self, now: SystemTime) {
        let keyspaces: Vec<Arc<Store>> =
            self.keyspaces.read().unwrap().values().cloned().collect();
        for store in keyspaces {
            store.clean_up_expired(now);
        }
    }

    /// Resolves, validates, and runs one parsed command, buffering the reply
    /// into `w`. User-facing errors are written as RESP errors and reported
    /// as success so the connection keeps going.
    pub fn execute(
        &self,
        w: &mut Writer,
        session: &mut Session,
        args: Vec<Option<Bytes>>,
    ) -> crate::Result<()> {
        if args.is_empty() || args[0].is_none() {
            w.write_error(commands::ERR_EMPTY_COMMAND);
            return Ok(());
        }
        let name = String::from_utf8_lossy(args[0].as_deref().unwrap_or_default()).to_uppercase();

        let spec = match self.registry.get(&name) {
            Some(spec) => spec,
            None => {
                w.write_error(&commands::unknown_command(&name, &args));
                return Ok(());
            }
        };

        let mut req = Request {
            name,
            args,
            session,
        };
        if let Err(msg) = commands::validate(&req, spec.arity) {
            w.write_error(&msg);
            return Ok(());
        }
        (spec.handler)(self, w, &mut req)
    }

    /// Per-connection loop: read one command array, execute, flush, repeat.
    /// Returns when the peer goes away or the stream desyncs.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream) -> crate::Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = Reader::new(BufReader::new(read_half));
        let mut writer = Writer::new();
        let mut session = Session::new();

        loop {
            let args = match reader.read_array_bulk().await {
                Ok(args) => args,
                // Peer hung up: close silently, no reply.
                Err(codec::Error::Io(_)) => return Ok(()),
                // Malformed framing: report once, then drop the connection,
                // the stream can no longer be trusted.
                Err(err @ codec::Error::Protocol(_)) => {
                    writer.write_error(&err.to_string());
                    writer.flush(&mut write_half).await?;
                    return Err(err.into());
                }
            };

            self.execute(&mut writer, &mut session, args)?;
            // A failed flush tears the connection down.
            writer.flush(&mut write_half).await?;
        }
    }
}

/// A running server instance: the embeddable facade. Binds a listener,
/// spawns the accept loop and the background expiration sweeper, and hands
/// the caller the controls a test needs (address, simulated time, shutdown).
pub struct Handle {
    addr: SocketAddr,
    server: Arc<Server>,
    shutdown: watch::Sender<bool>,
    done: oneshot::Receiver<()>,
}

impl Handle {
    /// Starts a server on an ephemeral local port with the clock seeded at
    /// the current wall time.
    pub async fn start() -> crate::Result<Handle> {
        Handle::bind("127.0.0.1:0").await
    }

    pub async fn bind(addr: impl ToSocketAddrs) -> crate::Result<Handle> {
        let clock = Arc::new(Clock::new(SystemTime::now()));
        Handle::bind_with(addr, clock, Arc::new(TracingLogger)).await
    }

    /// Full-control constructor for embedders that want to seed the clock or
    /// inject their own log sink.
    pub async fn bind_with(
        addr: impl ToSocketAddrs,
        clock: Arc<Clock>,
        log: Arc<dyn Logger>,
    ) -> crate::Result<Handle> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let server = Arc::new(Server::new(clock, log)?);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (done_tx, done) = oneshot::channel();

        tokio::spawn(accept_loop(
            listener,
            server.clone(),
            shutdown_rx.clone(),
            done_tx,
        ));
        tokio::spawn(sweep_loop(server.clone(), shutdown_rx));

        server.log.info(&format!("listening on {addr}"));
        Ok(Handle {
            addr,
            server,
            shutdown,
            done,
        })
    }

    /// The bound TCP address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Advances the simulated clock and immediately sweeps expired keys, so
    /// expiry is observable without waiting for the background interval.
    /// Returns the new simulated time.
    pub fn fast_forward(&self, d: Duration) -> SystemTime {
        let now = self.server.clock.advance(d);
        self.server.clean_up_expired(now);
        now
    }

    /// Stops accepting connections, closes the listener, and waits for the
    /// accept loop to confirm. Connections already accepted are not
    /// force-closed; they drain through their own I/O errors.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.done.await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    server: Arc<Server>,
    mut shutdown: watch::Receiver<bool>,
    done: oneshot::Sender<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        server.log.error(&format!("accept failed: {err}"));
                        break;
                    }
                };
                let connection_id = Uuid::new_v4();
                server.log.info(&format!(
                    "connection {connection_id} accepted from {peer}"
                ));

                let server = server.clone();
                tokio::spawn(async move {
                    if let Err(err) = server.clone().handle_connection(stream).await {
                        server.log.warn(&format!("connection {connection_id}: {err}"));
                    } else {
                        server.log.info(&format!("connection {connection_id} closed"));
                    }
                });
            }
        }
    }
    // Listener drops here; the completion channel tells shutdown() the
    // accept loop is gone.
    drop(listener);
    let _ = done.send(());
}

/// Periodic active expiration, independent of client traffic.
async fn sweep_loop(server: Arc<Server>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tick.tick() => server.clean_up_expired(server.now()),
        }
    }
}
