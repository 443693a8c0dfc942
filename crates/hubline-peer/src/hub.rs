//! The hub: accepts peers, tracks them, and routes hub-authored frames.
//!
//! The event loop never waits on whoever consumes [`Event`]s. Events the
//! consumer has no room for wait in a backlog; while it is full the loop stops
//! reading connection events, which pushes back on the reader tasks only.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use hubline_frame::{Frame, FrameError, DEFAULT_MAX_BODY, HEADER_SIZE};
use hubline_transport::{bind_async, default_hub_addr, ConnectionId};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::connection::{spawn_connection, ConnectionContext};
use crate::error::{PeerError, Result};
use crate::event::Event;
use crate::registry::ConnectionRegistry;
use crate::router::{route, RouteReport, Selector};

const COMMAND_CAPACITY: usize = 64;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Default capacity of event channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Listen address. Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,
    /// Largest body (header + payload) accepted or sent.
    pub max_body_size: usize,
    /// Capacity of the event channel handed to the caller.
    pub event_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_hub_addr(),
            max_body_size: DEFAULT_MAX_BODY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

enum Command {
    Send {
        selector: Selector,
        frame: Frame,
        reply: oneshot::Sender<Result<RouteReport>>,
    },
    Connections {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
}

/// Cloneable control surface of a running [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
}

impl HubHandle {
    /// The address the hub listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Route a frame to the connections `selector` names.
    pub async fn send(&self, selector: Selector, frame: Frame) -> Result<RouteReport> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                selector,
                frame,
                reply,
            })
            .await
            .map_err(|_| PeerError::HubStopped)?;
        response.await.map_err(|_| PeerError::HubStopped)?
    }

    pub async fn send_message(
        &self,
        selector: Selector,
        text: impl Into<Bytes>,
    ) -> Result<RouteReport> {
        self.send(selector, Frame::message(text)).await
    }

    pub async fn send_attachment(
        &self,
        selector: Selector,
        name: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<RouteReport> {
        let frame = Frame::attachment(name, payload)?;
        self.send(selector, frame).await
    }

    /// Ids of the live connections, ascending.
    pub async fn connections(&self) -> Result<Vec<ConnectionId>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connections { reply })
            .await
            .map_err(|_| PeerError::HubStopped)?;
        response.await.map_err(|_| PeerError::HubStopped)
    }

    /// Stop accepting, close every connection and end [`Hub::run`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Accepts connections and owns the [`ConnectionRegistry`].
///
/// All registry access happens inside [`run`](Hub::run), so inserts,
/// removals and broadcasts never interleave.
pub struct Hub {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_body_size: usize,
    registry: ConnectionRegistry,
    commands: mpsc::Receiver<Command>,
    connection_events: mpsc::Receiver<Event>,
    events: mpsc::Sender<Event>,
    backlog: VecDeque<Event>,
    backlog_limit: usize,
    presenting: bool,
    ctx: ConnectionContext,
}

impl Hub {
    /// Bind the listener.
    ///
    /// Returns the hub (drive it with [`run`](Hub::run)), a handle for
    /// sending and shutdown, and the receiver of connection events.
    pub async fn bind(config: HubConfig) -> Result<(Self, HubHandle, mpsc::Receiver<Event>)> {
        let listener = bind_async(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let capacity = config.event_capacity.max(1);
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (connection_tx, connection_events) = mpsc::channel(capacity);
        let (events, event_rx) = mpsc::channel(capacity);
        let shutdown = CancellationToken::new();

        let hub = Self {
            listener,
            local_addr,
            max_body_size: config.max_body_size,
            registry: ConnectionRegistry::new(),
            commands,
            connection_events,
            events,
            backlog: VecDeque::new(),
            backlog_limit: capacity,
            presenting: true,
            ctx: ConnectionContext {
                events: connection_tx,
                shutdown: shutdown.clone(),
                tracker: TaskTracker::new(),
                max_body: config.max_body_size,
            },
        };
        let handle = HubHandle {
            commands: command_tx,
            shutdown,
            local_addr,
        };
        Ok((hub, handle, event_rx))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the event loop until [`HubHandle::shutdown`] is called.
    pub async fn run(mut self) {
        info!(local_addr = %self.local_addr, "hub running");
        let shutdown = self.ctx.shutdown.clone();
        let mut commands_open = true;
        let events = self.events.clone();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = events.reserve(), if !self.backlog.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(event) = self.backlog.pop_front() {
                            permit.send(event);
                        }
                    }
                    Err(_) => self.stop_presenting(),
                },
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.execute(command),
                    None => {
                        debug!("every hub handle dropped");
                        commands_open = false;
                    }
                },
                Some(event) = self.connection_events.recv(),
                    if self.backlog.len() < self.backlog_limit =>
                {
                    self.on_connection_event(event);
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => self.register(stream, peer_addr),
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(events);
        self.stop().await;
    }

    fn register(&mut self, stream: TcpStream, peer_addr: SocketAddr) {
        let id = ConnectionId::from_socket(&stream);
        if self.registry.contains(id) {
            // Dropped before any task exists, so no event can name `id`.
            warn!(connection_id = %id, %peer_addr, "rejecting connection: id in use");
            return;
        }

        let handle = spawn_connection(stream, Some(peer_addr), &self.ctx);
        if let Err(err) = self.registry.insert(handle.clone()) {
            warn!(connection_id = %id, error = %err, "rejecting connection");
            handle.close();
            return;
        }

        info!(
            connection_id = %id,
            %peer_addr,
            connections = self.registry.len(),
            "connection opened"
        );
        self.forward(Event::ConnectionOpened {
            id,
            peer_addr: Some(peer_addr),
        });
    }

    fn on_connection_event(&mut self, event: Event) {
        if event.is_terminal() {
            let id = event.connection_id();
            if self.registry.remove(id).is_some() {
                info!(
                    connection_id = %id,
                    connections = self.registry.len(),
                    "connection removed"
                );
            }
        }
        self.forward(event);
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Send {
                selector,
                frame,
                reply,
            } => {
                let result = self.route_frame(selector, &frame);
                if reply.send(result).is_err() {
                    trace!("send caller went away");
                }
            }
            Command::Connections { reply } => {
                if reply.send(self.registry.ids()).is_err() {
                    trace!("connections caller went away");
                }
            }
        }
    }

    fn route_frame(&self, selector: Selector, frame: &Frame) -> Result<RouteReport> {
        let max = self.max_body_size.saturating_sub(HEADER_SIZE);
        if frame.size() > max {
            return Err(FrameError::PayloadTooLarge {
                size: frame.size(),
                max,
            }
            .into());
        }
        route(&self.registry, selector, frame.encode()?)
    }

    /// Hand `event` to the consumer, or queue it behind earlier ones.
    fn forward(&mut self, event: Event) {
        if !self.presenting {
            return;
        }
        if !self.backlog.is_empty() {
            self.backlog.push_back(event);
            return;
        }
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                trace!("event consumer lagging");
                self.backlog.push_back(event);
            }
            Err(TrySendError::Closed(_)) => self.stop_presenting(),
        }
    }

    fn stop_presenting(&mut self) {
        trace!(discarded = self.backlog.len(), "event receiver dropped");
        self.presenting = false;
        self.backlog.clear();
    }

    async fn stop(mut self) {
        info!(connections = self.registry.len(), "hub shutting down");
        let backlog = std::mem::take(&mut self.backlog);
        for event in backlog {
            self.forward_now(event);
        }
        for handle in self.registry.drain() {
            handle.close();
        }

        let tracker = self.ctx.tracker.clone();
        tracker.close();
        let finished = tracker.wait();
        tokio::pin!(finished);

        loop {
            tokio::select! {
                biased;
                Some(event) = self.connection_events.recv() => self.forward_now(event),
                _ = &mut finished => break,
            }
        }
        while let Ok(event) = self.connection_events.try_recv() {
            self.forward_now(event);
        }
        info!("hub stopped");
    }

    fn forward_now(&self, event: Event) {
        if let Err(err) = self.events.try_send(event) {
            trace!(error = %err, "event dropped during shutdown");
        }
    }
}
