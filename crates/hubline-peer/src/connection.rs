//! Per-connection reader and writer tasks.
//!
//! Each socket is split in two. The reader task owns the read half and the
//! connection's [`StreamReassembler`]; the writer task owns the write half and
//! drains an unbounded queue, so whoever routes a frame never waits on the
//! network. The writer keeps its half alive until every [`ConnectionHandle`]
//! is dropped: the descriptor, and with it the [`ConnectionId`], cannot be
//! reused while a registry still holds the handle.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use hubline_frame::{decode_body, StreamReassembler};
use hubline_transport::ConnectionId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use crate::error::{PeerError, Result};
use crate::event::{ConnectionErrorKind, Event};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Sending side of one live connection.
///
/// Cheap to clone; all clones feed the same writer task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Bytes>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// A handle with no socket behind it; queued frames appear on the receiver.
    pub fn detached(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id,
            peer_addr: None,
            outbound,
            open: Arc::new(AtomicBool::new(true)),
            cancel: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Whether the socket is still usable for sending.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    /// Queue encoded frame bytes for the writer task.
    pub fn send_bytes(&self, bytes: Bytes) -> Result<()> {
        if !self.is_open() {
            return Err(PeerError::SocketNotOpen(self.id));
        }
        self.outbound
            .send(bytes)
            .map_err(|_| PeerError::SocketNotOpen(self.id))
    }

    /// Ask both tasks to stop. The reader reports `ConnectionClosed`.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Shared plumbing for spawning connection tasks.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub events: mpsc::Sender<Event>,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub max_body: usize,
}

/// Split `stream` and spawn its reader and writer tasks.
pub(crate) fn spawn_connection(
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    ctx: &ConnectionContext,
) -> ConnectionHandle {
    let id = ConnectionId::from_socket(&stream);
    if let Err(err) = stream.set_nodelay(true) {
        trace!(connection_id = %id, error = %err, "could not disable nagle");
    }

    let (read_half, write_half) = stream.into_split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(true));
    let cancel = ctx.shutdown.child_token();

    let link = Link {
        id,
        open: Arc::clone(&open),
        cancel: cancel.clone(),
        events: ctx.events.clone(),
    };

    ctx.tracker.spawn(read_loop(
        read_half,
        link.clone(),
        StreamReassembler::with_max_body(ctx.max_body),
    ));
    ctx.tracker.spawn(write_loop(write_half, outbound_rx, link));

    ConnectionHandle {
        id,
        peer_addr,
        outbound,
        open,
        cancel,
    }
}

/// What both tasks of one connection share.
#[derive(Clone)]
struct Link {
    id: ConnectionId,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: mpsc::Sender<Event>,
}

impl Link {
    /// Deliver an event unless the connection is cancelled first.
    async fn emit(&self, event: Event) -> bool {
        tokio::select! {
            biased;
            sent = self.events.send(event) => sent.is_ok(),
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Emit the terminal event exactly once, whichever task gets here first.
    async fn finish(&self, event: Event) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        if self.cancel.is_cancelled() {
            if let Err(err) = self.events.try_send(event) {
                trace!(connection_id = %self.id, error = %err, "terminal event not delivered");
            }
        } else if !self.emit(event).await {
            trace!(connection_id = %self.id, "terminal event not delivered");
        }
        self.cancel.cancel();
    }
}

enum Outcome {
    Eof,
    Cancelled,
    Failed(ConnectionErrorKind, String),
}

async fn read_loop(mut reader: OwnedReadHalf, link: Link, mut reassembler: StreamReassembler) {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    let outcome = 'read: loop {
        let read = tokio::select! {
            biased;
            _ = link.cancel.cancelled() => break Outcome::Cancelled,
            read = reader.read(&mut chunk) => read,
        };

        let n = match read {
            Ok(0) => break Outcome::Eof,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                break Outcome::Failed(ConnectionErrorKind::from_io(&err), err.to_string());
            }
        };
        trace!(connection_id = %link.id, size = n, "read");
        reassembler.push(&chunk[..n]);

        loop {
            let body = match reassembler.next_body() {
                Ok(Some(body)) => body,
                Ok(None) => break,
                Err(err) => {
                    let kind = ConnectionErrorKind::FrameTooLarge;
                    break 'read Outcome::Failed(kind, err.to_string());
                }
            };

            let event = match decode_body(body) {
                Ok(frame) => {
                    debug!(
                        connection_id = %link.id,
                        kind = %frame.kind,
                        size = frame.size(),
                        "frame received"
                    );
                    Event::FrameReceived {
                        id: link.id,
                        frame,
                    }
                }
                Err(error) => {
                    warn!(connection_id = %link.id, %error, "dropping undecodable frame");
                    Event::FrameDropped { id: link.id, error }
                }
            };

            if !link.emit(event).await {
                break 'read Outcome::Cancelled;
            }
        }
    };

    if !reassembler.is_idle() {
        debug!(
            connection_id = %link.id,
            pending = reassembler.pending_len(),
            "discarding partial frame"
        );
        reassembler.clear();
    }

    let id = link.id;
    let event = match outcome {
        Outcome::Eof => {
            debug!(connection_id = %id, "remote closed connection");
            Event::ConnectionClosed { id }
        }
        Outcome::Cancelled => {
            debug!(connection_id = %id, "connection closed locally");
            Event::ConnectionClosed { id }
        }
        Outcome::Failed(kind, message) => {
            warn!(connection_id = %id, %kind, %message, "connection failed");
            Event::ConnectionError { id, kind, message }
        }
    };
    link.finish(event).await;
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    link: Link,
) {
    loop {
        let bytes = tokio::select! {
            biased;
            _ = link.cancel.cancelled() => break,
            next = outbound.recv() => match next {
                Some(bytes) => bytes,
                None => break,
            },
        };

        if let Err(err) = writer.write_all(&bytes).await {
            warn!(connection_id = %link.id, error = %err, "write failed");
            let kind = ConnectionErrorKind::from_io(&err);
            link.finish(Event::ConnectionError {
                id: link.id,
                kind,
                message: err.to_string(),
            })
            .await;
            break;
        }
        debug!(connection_id = %link.id, size = bytes.len(), "frame written");
    }

    link.cancel.cancel();
    if let Err(err) = writer.shutdown().await {
        trace!(connection_id = %link.id, error = %err, "shutdown of write half failed");
    }

    // Hold the write half until every handle is gone.
    let mut discarded = 0usize;
    while outbound.recv().await.is_some() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!(connection_id = %link.id, discarded, "dropped frames queued after close");
    }
    drop(writer);
}
