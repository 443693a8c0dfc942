//! Connection events and the presentation collaborator that consumes them.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::Path;

use hubline_frame::{Frame, FrameError, FrameKind};
use hubline_transport::{ConnectionId, TransportError};
use tracing::{debug, warn};

use crate::attachment::{AttachmentDecision, AttachmentOffer, AttachmentStore, PendingAttachment};

/// Something that happened on a connection.
#[derive(Debug)]
pub enum Event {
    /// A connection was accepted (hub) or established (session).
    ConnectionOpened {
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
    },
    /// The connection ended normally: remote close or local shutdown.
    ConnectionClosed { id: ConnectionId },
    /// The connection ended because of an error.
    ConnectionError {
        id: ConnectionId,
        kind: ConnectionErrorKind,
        message: String,
    },
    /// A complete frame was decoded.
    FrameReceived { id: ConnectionId, frame: Frame },
    /// A frame arrived whole but its header could not be decoded.
    FrameDropped { id: ConnectionId, error: FrameError },
}

impl Event {
    /// The connection this event belongs to.
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Event::ConnectionOpened { id, .. }
            | Event::ConnectionClosed { id }
            | Event::ConnectionError { id, .. }
            | Event::FrameReceived { id, .. }
            | Event::FrameDropped { id, .. } => *id,
        }
    }

    /// Whether this is the last event of its connection.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::ConnectionClosed { .. } | Event::ConnectionError { .. }
        )
    }
}

/// Coarse classification of connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    HostNotFound,
    ConnectionRefused,
    ConnectionReset,
    FrameTooLarge,
    Other,
}

impl ConnectionErrorKind {
    /// Classify a socket error.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectionErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => ConnectionErrorKind::ConnectionReset,
            _ => ConnectionErrorKind::Other,
        }
    }

    /// Classify a transport error, e.g. from a failed connect.
    pub fn from_transport(err: &TransportError) -> Self {
        match err {
            TransportError::InvalidAddress { .. } => ConnectionErrorKind::HostNotFound,
            TransportError::Connect { source, .. }
            | TransportError::Bind { source, .. }
            | TransportError::Accept(source)
            | TransportError::Io(source) => Self::from_io(source),
        }
    }

    /// Stable lowercase name for logs and machine-readable output.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionErrorKind::HostNotFound => "host_not_found",
            ConnectionErrorKind::ConnectionRefused => "connection_refused",
            ConnectionErrorKind::ConnectionReset => "connection_reset",
            ConnectionErrorKind::FrameTooLarge => "frame_too_large",
            ConnectionErrorKind::Other => "other",
        }
    }

    /// Advice shown to a person when this kind of failure happens.
    pub fn hint(self) -> &'static str {
        match self {
            ConnectionErrorKind::HostNotFound => {
                "the host was not found; check the host name and port settings"
            }
            ConnectionErrorKind::ConnectionRefused => {
                "the connection was refused by the peer; make sure the hub is running \
                 and check the host name and port settings"
            }
            ConnectionErrorKind::ConnectionReset => "the connection was reset by the peer",
            ConnectionErrorKind::FrameTooLarge => {
                "the peer announced a frame larger than the configured maximum"
            }
            ConnectionErrorKind::Other => "the connection failed",
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives decoded events on the consumer side of the event channel.
///
/// Every method has a no-op default so implementations only override what
/// they display. Attachments are rejected unless [`confirm_attachment`]
/// says otherwise.
///
/// [`confirm_attachment`]: Presentation::confirm_attachment
pub trait Presentation {
    fn on_connection_opened(&mut self, _id: ConnectionId, _peer_addr: Option<SocketAddr>) {}

    fn on_connection_closed(&mut self, _id: ConnectionId) {}

    fn on_connection_error(
        &mut self,
        _id: ConnectionId,
        _kind: ConnectionErrorKind,
        _message: &str,
    ) {
    }

    /// Called once per decoded frame, before any attachment decision.
    fn on_frame_received(&mut self, _id: ConnectionId, _frame: &Frame) {}

    fn on_frame_dropped(&mut self, _id: ConnectionId, _error: &FrameError) {}

    /// Decide what happens to an incoming attachment.
    fn confirm_attachment(&mut self, _offer: &AttachmentOffer) -> AttachmentDecision {
        AttachmentDecision::Reject
    }

    fn on_attachment_stored(&mut self, _offer: &AttachmentOffer, _path: &Path) {}

    fn on_attachment_discarded(&mut self, _offer: &AttachmentOffer) {}

    fn on_attachment_store_failed(&mut self, _offer: &AttachmentOffer, _error: &io::Error) {}
}

/// Hand one event to the presentation layer.
///
/// Attachments go through [`Presentation::confirm_attachment`]; accepted ones
/// are written with `store`. A deferred decision comes back as a
/// [`PendingAttachment`] for the caller to settle later.
pub fn dispatch<P>(
    event: Event,
    presentation: &mut P,
    store: &dyn AttachmentStore,
) -> Option<PendingAttachment>
where
    P: Presentation + ?Sized,
{
    match event {
        Event::ConnectionOpened { id, peer_addr } => {
            presentation.on_connection_opened(id, peer_addr);
            None
        }
        Event::ConnectionClosed { id } => {
            presentation.on_connection_closed(id);
            None
        }
        Event::ConnectionError { id, kind, message } => {
            presentation.on_connection_error(id, kind, &message);
            None
        }
        Event::FrameDropped { id, error } => {
            presentation.on_frame_dropped(id, &error);
            None
        }
        Event::FrameReceived { id, frame } => {
            presentation.on_frame_received(id, &frame);
            if frame.kind != FrameKind::Attachment {
                return None;
            }

            let offer = AttachmentOffer::from_frame(id, &frame);
            match presentation.confirm_attachment(&offer) {
                AttachmentDecision::Accept => {
                    settle_accepted(presentation, store, &offer, &frame.payload);
                    None
                }
                AttachmentDecision::Reject => {
                    debug!(connection_id = %id, name = %offer.name, "attachment rejected");
                    presentation.on_attachment_discarded(&offer);
                    None
                }
                AttachmentDecision::Defer => Some(PendingAttachment::new(offer, frame.payload)),
            }
        }
    }
}

fn settle_accepted<P>(
    presentation: &mut P,
    store: &dyn AttachmentStore,
    offer: &AttachmentOffer,
    payload: &[u8],
) where
    P: Presentation + ?Sized,
{
    match store.store(&offer.name, payload) {
        Ok(path) => {
            debug!(connection_id = %offer.id, path = %path.display(), "attachment stored");
            presentation.on_attachment_stored(offer, &path);
        }
        Err(err) => {
            warn!(
                connection_id = %offer.id,
                name = %offer.name,
                error = %err,
                "failed to store attachment"
            );
            presentation.on_attachment_store_failed(offer, &err);
        }
    }
}
