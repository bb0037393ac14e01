//! The accept loop, per-connection request handler, and Multicast fan-out.

use crate::connection::Connection;
use crate::error::HubError;
use crate::idpool::{IdPool, IncrementalIdPool, ReusableIdPool};
use crate::quit::Quit;
use crate::registry::Registry;
use crate::stats::Stats;
use crate::wire::{Answer, Request};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type ServerConnection = Connection<Request, Answer>;

/// Which id allocation strategy a [`Hub`] uses. Chosen once at startup;
/// the dispatcher only ever depends on the [`IdPool`] trait.
pub enum IdPoolKind {
    Incremental,
    Reusable,
}

/// A running relay hub: the bound listener, the peer registry, the id
/// pool, and the accept loop.
pub struct Hub {
    listener: TcpListener,
    shared: Arc<HubShared>,
}

/// State shared between the accept loop and every spawned per-connection
/// task. The hub holds connections; a connection holds no reference back
/// to the hub beyond this shared bundle, and it is dropped from the
/// registry the moment the connection's handler observes quit, severing
/// the only back-edge.
struct HubShared {
    registry: Registry<Arc<ServerConnection>>,
    id_pool: Box<dyn IdPool>,
    recycle_ids: bool,
    stats: Arc<Stats>,
    quit: Quit,
    /// Fires once `run`'s accept loop has actually returned, so `stop` can
    /// wait for it before re-reading the registry — closing the window
    /// where an unbiased `select!` lets one more connection through after
    /// `quit` was fired.
    run_done: Quit,
    run_started: AtomicBool,
    /// Join handles for every spawned `handle_connection` task, reaped
    /// lazily on each new accept so the vec stays close to the live
    /// connection count rather than growing for the life of the process.
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl HubShared {
    async fn track_task(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }
}

impl Hub {
    /// Bind the listener. The only fatal error the hub produces.
    pub async fn bind(port: u16, id_pool_kind: IdPoolKind) -> Result<Self, HubError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(HubError::Bind)?;
        let (id_pool, recycle_ids): (Box<dyn IdPool>, bool) = match id_pool_kind {
            IdPoolKind::Incremental => (Box::new(IncrementalIdPool::new()), false),
            IdPoolKind::Reusable => (Box::new(ReusableIdPool::new()), true),
        };
        info!(port, "hub bound");
        Ok(Self {
            listener,
            shared: Arc::new(HubShared {
                registry: Registry::new(),
                id_pool,
                recycle_ids,
                stats: Arc::new(Stats::new()),
                quit: Quit::new(),
                run_done: Quit::new(),
                run_started: AtomicBool::new(false),
                tasks: AsyncMutex::new(Vec::new()),
            }),
        })
    }

    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    pub fn stats(&self) -> &Stats {
        self.shared.stats.as_ref()
    }

    /// Accept loop. Runs until the listener errors or `stop` fires the
    /// hub's quit signal, at which point it returns.
    pub async fn run(&self) {
        self.shared.run_started.store(true, Ordering::SeqCst);
        self.run_accept_loop().await;
        self.shared.run_done.fire();
    }

    async fn run_accept_loop(&self) {
        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = self.shared.quit.fired() => {
                    debug!("accept loop stopping on quit");
                    return;
                }
            };
            match accepted {
                Ok((socket, addr)) => {
                    let id = self.shared.id_pool.acquire();
                    debug!(id, %addr, "accepted connection");
                    let conn = Arc::new(ServerConnection::spawn_with_stats(
                        id,
                        socket,
                        self.shared.stats.clone(),
                    ));
                    self.shared.registry.insert(id, conn.clone()).await;
                    self.shared.stats.record_connect();
                    let shared = self.shared.clone();
                    let handle = tokio::spawn(async move {
                        handle_connection(shared, conn).await;
                    });
                    self.shared.track_task(handle).await;
                }
                Err(e) => {
                    warn!(error = %e, "accept loop terminating");
                    return;
                }
            }
        }
    }

    /// Stop accepting new connections, close every still-registered
    /// connection, then wait for every per-connection handler to finish
    /// tearing down (registry removal, id release, disconnect counter).
    ///
    /// `quit` alone doesn't stop `run`'s unbiased `select!` from letting one
    /// more backlogged connection through, so `stop` waits for `run_done` —
    /// the accept loop having actually returned — before reading the
    /// registry; that straggler is registered and its handler tracked
    /// before `run_done` fires, since both happen earlier in the same
    /// iteration.
    pub async fn stop(&self) {
        self.shared.quit.fire();
        if self.shared.run_started.load(Ordering::SeqCst) {
            self.shared.run_done.fired().await;
        }

        let connections = self.shared.registry.values().await;
        for conn in &connections {
            conn.close();
        }

        let handles = {
            let mut tasks = self.shared.tasks.lock().await;
            std::mem::take(&mut *tasks)
        };
        for handle in handles {
            let _ = handle.await;
        }

        info!("hub stopped");
    }
}

/// Per-connection handler: select on (incoming request, quit). Requests
/// are dispatched in a fresh task so a slow Multicast never blocks the
/// next request from the same peer.
async fn handle_connection(shared: Arc<HubShared>, conn: Arc<ServerConnection>) {
    loop {
        let request = tokio::select! {
            request = conn.recv() => request,
            _ = conn.quit().fired() => None,
        };
        match request {
            Some(request) => {
                shared.stats.record_incoming();
                let shared = shared.clone();
                let conn = conn.clone();
                tokio::spawn(async move {
                    dispatch(&shared, &conn, request).await;
                });
            }
            None => break,
        }
    }

    shared.registry.remove(conn.id()).await;
    if shared.recycle_ids {
        shared.id_pool.release(conn.id());
    }
    conn.close();
    shared.stats.record_disconnect();
    debug!(id = conn.id(), "connection torn down");
}

async fn dispatch(shared: &Arc<HubShared>, sender: &Arc<ServerConnection>, request: Request) {
    match request {
        Request::Identity => {
            let _ = sender.send(Answer::Identity(sender.id())).await;
            shared.stats.record_outgoing();
        }
        Request::List => {
            let mut ids = shared.registry.ids().await;
            ids.retain(|&id| id != sender.id());
            let _ = sender.send(Answer::List(ids)).await;
            shared.stats.record_outgoing();
        }
        Request::Relay { recipients, body } => {
            multicast(shared, recipients, body).await;
        }
        Request::Other(tag) => {
            debug!(tag, "dropping request with unhandled tag");
        }
    }
}

/// Fan out a Relay request's body to each recipient that is still
/// registered. The Answer is encoded exactly once; every recipient's
/// writer task shares the same immutable byte buffer via `Bytes`'s
/// reference-counted clone.
async fn multicast(shared: &Arc<HubShared>, recipients: Vec<u64>, body: Vec<u8>) {
    use crate::wire::Framed;
    let encoded = Bytes::from(Answer::Relay(body).encode());
    for recipient_id in recipients {
        let Some(recipient) = shared.registry.get(recipient_id).await else {
            continue;
        };
        let shared = shared.clone();
        let payload = encoded.clone();
        tokio::spawn(async move {
            if recipient.send_bytes(payload).await.is_ok() {
                shared.stats.record_outgoing();
            }
        });
    }
}
