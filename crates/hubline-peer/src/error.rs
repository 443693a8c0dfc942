use hubline_transport::ConnectionId;

/// Errors that can occur in hub and session operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] hubline_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] hubline_frame::FrameError),

    /// The connection exists but its socket is no longer open.
    #[error("socket of connection {0} doesn't seem to be open")]
    SocketNotOpen(ConnectionId),

    /// The session has been shut down.
    #[error("not connected")]
    NotConnected,

    /// No live connection matches the selector.
    #[error("no connection with id {0}")]
    RouteNotFound(ConnectionId),

    /// A connection with this id is already registered.
    #[error("connection {0} is already registered")]
    DuplicateId(ConnectionId),

    /// Registry lookup for an unknown id.
    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    /// The hub event loop is no longer running.
    #[error("hub is not running")]
    HubStopped,

    /// I/O error outside the transport layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
