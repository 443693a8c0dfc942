//! The single-connection peer role.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use hubline_frame::{Frame, FrameError, DEFAULT_MAX_BODY, HEADER_SIZE};
use hubline_transport::{connect_async, default_peer_addr, ConnectionId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::connection::{spawn_connection, ConnectionContext, ConnectionHandle};
use crate::error::{PeerError, Result};
use crate::event::Event;
use crate::hub::DEFAULT_EVENT_CAPACITY;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hub to connect to.
    pub hub_addr: SocketAddr,
    /// Upper bound on connection establishment; `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Largest body (header + payload) accepted or sent.
    pub max_body_size: usize,
    /// Capacity of the event channel handed to the caller.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hub_addr: default_peer_addr(),
            connect_timeout: Some(Duration::from_secs(5)),
            max_body_size: DEFAULT_MAX_BODY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// One outbound connection to a hub.
///
/// Incoming frames arrive on the receiver returned by [`connect`](Self::connect),
/// as the same [`Event`]s a hub produces. Dropping the session closes the
/// connection.
pub struct PeerSession {
    handle: Option<ConnectionHandle>,
    id: ConnectionId,
    local_addr: SocketAddr,
    hub_addr: SocketAddr,
    max_body_size: usize,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl PeerSession {
    /// Connect to the hub and start the connection tasks.
    ///
    /// The first event on the receiver is `ConnectionOpened`.
    pub async fn connect(config: SessionConfig) -> Result<(Self, mpsc::Receiver<Event>)> {
        let stream = connect_async(config.hub_addr, config.connect_timeout).await?;
        let local_addr = stream.local_addr()?;
        let id = ConnectionId::from_socket(&stream);

        let (events, event_rx) = mpsc::channel(config.event_capacity.max(1));
        events
            .send(Event::ConnectionOpened {
                id,
                peer_addr: Some(config.hub_addr),
            })
            .await
            .map_err(|_| PeerError::NotConnected)?;

        let shutdown = CancellationToken::new();
        let ctx = ConnectionContext {
            events,
            shutdown: shutdown.clone(),
            tracker: TaskTracker::new(),
            max_body: config.max_body_size,
        };
        let handle = spawn_connection(stream, Some(config.hub_addr), &ctx);
        info!(connection_id = %id, hub = %config.hub_addr, %local_addr, "connected to hub");

        let session = Self {
            handle: Some(handle),
            id,
            local_addr,
            hub_addr: config.hub_addr,
            max_body_size: config.max_body_size,
            shutdown,
            tracker: ctx.tracker,
        };
        Ok((session, event_rx))
    }

    /// Id of this session's connection, as seen locally.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub_addr(&self) -> SocketAddr {
        self.hub_addr
    }

    /// Whether frames can still be sent.
    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(ConnectionHandle::is_open)
    }

    /// Queue a frame for sending.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(PeerError::NotConnected)?;

        let max = self.max_body_size.saturating_sub(HEADER_SIZE);
        if frame.size() > max {
            return Err(FrameError::PayloadTooLarge {
                size: frame.size(),
                max,
            }
            .into());
        }
        handle.send_bytes(frame.encode()?)
    }

    pub fn send_message(&self, text: impl Into<Bytes>) -> Result<()> {
        self.send(&Frame::message(text))
    }

    pub fn send_attachment(
        &self,
        name: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<()> {
        let frame = Frame::attachment(name, payload)?;
        self.send(&frame)
    }

    /// Close the connection and wait for its tasks to finish.
    ///
    /// Frames still queued are dropped, as is any partially received frame.
    /// Later sends fail with `NotConnected`.
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        info!(connection_id = %self.id, "disconnecting from hub");
        handle.close();
        drop(handle);

        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
