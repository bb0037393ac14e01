//! A single framed TCP connection: one reader task, one writer task, and
//! the channels the hub dispatcher and the client library use to talk to
//! them.
//!
//! `Connection<In, Out>` is generic over the decoded-incoming type `In`
//! and the encodable-outgoing type `Out`. A server-mode connection decodes
//! `Request`s and sends `Answer`s; a client-mode connection does the
//! reverse. The mode therefore lives entirely in which type parameters are
//! chosen, matching the wire format which carries no mode marker of its
//! own.

use crate::error::{ConnectionError, FrameIoError};
use crate::quit::Quit;
use crate::stats::Stats;
use crate::wire::{self, Framed};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

/// Outbound work item for a connection's writer task.
enum Outbound<Out> {
    Message(Out),
    Bytes(Bytes),
}

/// Outbound channel capacity. Tokio channels require capacity >= 1; the
/// rendezvous (capacity-0) semantics described for the outbound path are
/// not expressible in tokio, so 1 is the closest approximation: a sender
/// still blocks until the writer task has taken the previous item.
const CHANNEL_CAPACITY: usize = 1;

/// One TCP connection, framed according to `In`/`Out`.
///
/// `id` is zero until assigned by the hub; a connection constructed for
/// client-side use by `hub-client` never acquires one, since ids are a
/// server-side concept.
pub struct Connection<In, Out> {
    id: u64,
    closed: AtomicBool,
    close_guard: Mutex<()>,
    quit: Arc<Quit>,
    incoming_rx: AsyncMutex<mpsc::Receiver<In>>,
    outgoing_tx: mpsc::Sender<Outbound<Out>>,
    errors_rx: AsyncMutex<mpsc::Receiver<ConnectionError>>,
    bytes_read: Arc<AtomicU64>,
    bytes_written: Arc<AtomicU64>,
}

impl<In, Out> Connection<In, Out>
where
    In: Framed + Send + 'static,
    Out: Framed + Send + 'static,
{
    /// Split `stream` into owned halves, spawn the reader and writer
    /// tasks, and return the connection handle. `id` is 0 for connections
    /// that have not yet been assigned one.
    pub fn spawn(id: u64, stream: TcpStream) -> Self {
        Self::spawn_inner(id, stream, None)
    }

    /// Same as [`Connection::spawn`], but also tallies every frame's bytes
    /// into `stats` as the reader/writer tasks observe them, rather than
    /// once at teardown. Used by the hub so a long-lived connection's
    /// throughput shows up in the running counters, not just at
    /// disconnect.
    pub fn spawn_with_stats(id: u64, stream: TcpStream, stats: Arc<Stats>) -> Self {
        Self::spawn_inner(id, stream, Some(stats))
    }

    fn spawn_inner(id: u64, stream: TcpStream, stats: Option<Arc<Stats>>) -> Self {
        let (read_half, write_half) = stream.into_split();

        let (incoming_tx, incoming_rx) = mpsc::channel::<In>(CHANNEL_CAPACITY);
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Outbound<Out>>(CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel::<ConnectionError>(16);

        let quit = Arc::new(Quit::new());
        let bytes_read = Arc::new(AtomicU64::new(0));
        let bytes_written = Arc::new(AtomicU64::new(0));

        tokio::spawn(reader_loop(
            read_half,
            incoming_tx,
            errors_tx.clone(),
            quit.clone(),
            bytes_read.clone(),
            stats.clone(),
        ));
        tokio::spawn(writer_loop(
            write_half,
            outgoing_rx,
            errors_tx,
            quit.clone(),
            bytes_written.clone(),
            stats,
        ));

        Self {
            id,
            closed: AtomicBool::new(false),
            close_guard: Mutex::new(()),
            quit,
            incoming_rx: AsyncMutex::new(incoming_rx),
            outgoing_tx,
            errors_rx: AsyncMutex::new(errors_rx),
            bytes_read,
            bytes_written,
        }
    }

    /// Cumulative bytes read from the wire, including frame headers.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Cumulative bytes written to the wire, including frame headers.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn quit(&self) -> &Quit {
        &self.quit
    }

    /// Receive the next decoded incoming message, or `None` once the
    /// reader has terminated and the channel is drained.
    pub async fn recv(&self) -> Option<In> {
        self.incoming_rx.lock().await.recv().await
    }

    /// Receive the next non-fatal error observed by the reader or writer,
    /// or `None` once both have terminated and the channel is drained.
    pub async fn recv_error(&self) -> Option<ConnectionError> {
        self.errors_rx.lock().await.recv().await
    }

    fn closed_error() -> ConnectionError {
        ConnectionError::Io(std::io::Error::from(std::io::ErrorKind::NotConnected))
    }

    /// Enqueue a typed message for the writer task to encode and send.
    /// Races against the connection's own quit signal so a send to a
    /// recipient that disconnects mid-enqueue does not block forever;
    /// cancellation surfaces as the same "closed" error a caller would see
    /// from a connection already closed outright.
    pub async fn send(&self, msg: Out) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(Self::closed_error());
        }
        tokio::select! {
            result = self.outgoing_tx.send(Outbound::Message(msg)) => {
                result.map_err(|_| Self::closed_error())
            }
            _ = self.quit.fired() => Err(Self::closed_error()),
        }
    }

    /// Enqueue an already-encoded byte buffer, skipping re-encoding. Used
    /// by Multicast so a single encoded Relay answer is shared across
    /// every recipient's writer task. Same cancel-on-quit behavior as
    /// [`Connection::send`].
    pub async fn send_bytes(&self, bytes: Bytes) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(Self::closed_error());
        }
        tokio::select! {
            result = self.outgoing_tx.send(Outbound::Bytes(bytes)) => {
                result.map_err(|_| Self::closed_error())
            }
            _ = self.quit.fired() => Err(Self::closed_error()),
        }
    }

    /// Idempotent close: only the first caller observes `true` and
    /// actually fires quit. Safe under concurrent callers.
    pub fn close(&self) -> bool {
        let _guard = self.close_guard.lock().expect("close guard poisoned");
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.quit.fire();
        true
    }
}

async fn reader_loop<In>(
    mut read_half: OwnedReadHalf,
    incoming_tx: mpsc::Sender<In>,
    errors_tx: mpsc::Sender<ConnectionError>,
    quit: Arc<Quit>,
    bytes_read: Arc<AtomicU64>,
    stats: Option<Arc<Stats>>,
) where
    In: Framed,
{
    loop {
        let frame = tokio::select! {
            frame = wire::read_frame(&mut read_half) => frame,
            _ = quit.fired() => return,
        };
        match frame {
            Ok(payload) => {
                let n = payload.len() as u64 + 4;
                bytes_read.fetch_add(n, Ordering::Relaxed);
                if let Some(stats) = &stats {
                    stats.record_bytes_read(n);
                }
                match In::decode(&payload) {
                    Ok(msg) => {
                        if incoming_tx.send(msg).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = errors_tx.try_send(ConnectionError::Decode(e));
                    }
                }
            }
            Err(FrameIoError::PeerClosed) => {
                quit.fire();
                return;
            }
            Err(FrameIoError::Io(e)) => {
                let _ = errors_tx.try_send(ConnectionError::Io(e));
                quit.fire();
                return;
            }
        }
    }
}

async fn writer_loop<Out>(
    mut write_half: OwnedWriteHalf,
    mut outgoing_rx: mpsc::Receiver<Outbound<Out>>,
    errors_tx: mpsc::Sender<ConnectionError>,
    quit: Arc<Quit>,
    bytes_written: Arc<AtomicU64>,
    stats: Option<Arc<Stats>>,
) where
    Out: Framed,
{
    loop {
        let item = tokio::select! {
            item = outgoing_rx.recv() => item,
            _ = quit.fired() => return,
        };
        let Some(item) = item else { return };
        let payload = match item {
            Outbound::Message(msg) => msg.encode(),
            Outbound::Bytes(bytes) => bytes.to_vec(),
        };
        if let Err(e) = wire::write_frame(&mut write_half, &payload).await {
            let _ = errors_tx.try_send(ConnectionError::Io(e));
            quit.fire();
            return;
        }
        let n = payload.len() as u64 + 4;
        bytes_written.fetch_add(n, Ordering::Relaxed);
        if let Some(stats) = &stats {
            stats.record_bytes_written(n);
        }
    }
}
