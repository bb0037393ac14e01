//! A thin client wrapper around [`hub_core`]'s wire codec and a TCP
//! socket: connect, send Requests, and receive Answers on three
//! tag-specific channels plus the raw bypass operations the hub's own
//! synchronous tests use.

use bytes::Bytes;
use hub_core::{Answer, ClientConnection, Request};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed")]
    Closed,
}

/// Channel capacity for each tag-specific answer queue. Bounded rather
/// than the original's unbuffered hand-off; a slow consumer backs up the
/// dispatcher's own select loop against `quit` instead of blocking the
/// socket reader.
const ANSWER_CHANNEL_CAPACITY: usize = 32;

struct Inner {
    conn: ClientConnection,
    id: AtomicU64,
    last_list: RwLock<Vec<u64>>,
}

/// A connected client. `Client::connect` performs the identity handshake
/// before returning, so `id()` is always valid on a live client.
pub struct Client {
    inner: Arc<Inner>,
    incoming_id: mpsc::Receiver<Answer>,
    incoming_list: mpsc::Receiver<Answer>,
    incoming_relay: mpsc::Receiver<Answer>,
}

impl Client {
    /// Dial `address:port`, spawn the connection's reader/writer tasks and
    /// the answer-dispatch task, then perform the identity handshake.
    pub async fn connect(address: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((address, port)).await?;
        let conn = ClientConnection::spawn(0, stream);

        let (id_tx, incoming_id) = mpsc::channel(ANSWER_CHANNEL_CAPACITY);
        let (list_tx, incoming_list) = mpsc::channel(ANSWER_CHANNEL_CAPACITY);
        let (relay_tx, incoming_relay) = mpsc::channel(ANSWER_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            conn,
            id: AtomicU64::new(0),
            last_list: RwLock::new(Vec::new()),
        });

        tokio::spawn(dispatch_answers(
            inner.clone(),
            id_tx,
            list_tx,
            relay_tx,
        ));

        inner
            .conn
            .send(Request::Identity)
            .await
            .map_err(|_| ClientError::Closed)?;

        let mut client = Self {
            inner,
            incoming_id,
            incoming_list,
            incoming_relay,
        };
        // Block until the handshake answer arrives so `id()` is valid the
        // moment `connect` returns, matching the synchronous feel of the
        // system this replaces.
        client.incoming_id.recv().await.ok_or(ClientError::Closed)?;
        Ok(client)
    }

    pub fn id(&self) -> u64 {
        self.inner.id.load(Ordering::SeqCst)
    }

    pub async fn list(&self) -> Vec<u64> {
        self.inner.last_list.read().await.clone()
    }

    /// Await the next Identity answer (beyond the one consumed during the
    /// handshake).
    pub async fn incoming_id(&mut self) -> Option<Answer> {
        self.incoming_id.recv().await
    }

    pub async fn incoming_list(&mut self) -> Option<Answer> {
        self.incoming_list.recv().await
    }

    pub async fn incoming_relay(&mut self) -> Option<Answer> {
        self.incoming_relay.recv().await
    }

    /// Submit a typed Request, encoded and written by the connection's
    /// writer task.
    pub async fn send(&self, request: Request) -> Result<(), ClientError> {
        self.inner
            .conn
            .send(request)
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Submit a Relay with `recipients` and `body`, constructing the
    /// Request and rejecting oversize inputs before anything is sent.
    pub async fn relay(&self, recipients: Vec<u64>, body: Vec<u8>) -> Result<(), ClientError> {
        let request = Request::relay(recipients, body).map_err(|_| ClientError::Closed)?;
        self.send(request).await
    }

    /// Submit an already-encoded byte buffer, bypassing the typed-message
    /// path entirely.
    pub async fn send_bytes(&self, payload: Bytes) -> Result<(), ClientError> {
        self.inner
            .conn
            .send_bytes(payload)
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Ask the hub for the current peer list and wait for the answer.
    pub async fn refresh_list(&mut self) -> Result<Vec<u64>, ClientError> {
        self.send(Request::List).await?;
        self.incoming_list.recv().await.ok_or(ClientError::Closed)?;
        Ok(self.list().await)
    }

    /// Close the connection. Idempotent.
    pub fn disconnect(&self) {
        self.inner.conn.close();
    }

    pub fn is_connected(&self) -> bool {
        !self.inner.conn.is_closed()
    }
}

/// Read every Answer off the connection and fan it out to the
/// tag-specific channel, non-blocking against a slow consumer by racing
/// each send against the connection's own quit signal.
async fn dispatch_answers(
    inner: Arc<Inner>,
    id_tx: mpsc::Sender<Answer>,
    list_tx: mpsc::Sender<Answer>,
    relay_tx: mpsc::Sender<Answer>,
) {
    loop {
        let answer = tokio::select! {
            answer = inner.conn.recv() => answer,
            _ = inner.conn.quit().fired() => None,
        };
        let Some(answer) = answer else { return };

        let dest = match &answer {
            Answer::Identity(id) => {
                inner.id.store(*id, Ordering::SeqCst);
                &id_tx
            }
            Answer::List(ids) => {
                *inner.last_list.write().await = ids.clone();
                &list_tx
            }
            Answer::Relay(_) => &relay_tx,
            Answer::Other(tag, _) => {
                debug!(tag, "client received unrecognized answer tag");
                continue;
            }
        };

        tokio::select! {
            result = dest.send(answer) => {
                if result.is_err() {
                    return;
                }
            }
            _ = inner.conn.quit().fired() => {
                warn!("dropping answer, connection quitting");
                return;
            }
        }
    }
}
