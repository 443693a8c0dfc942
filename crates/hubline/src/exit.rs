use std::fmt;
use std::io;

use hubline_frame::FrameError;
use hubline_peer::{ConnectionErrorKind, PeerError};
use hubline_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => FAILURE,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let hint = ConnectionErrorKind::from_transport(&err).hint();
    let mut cli_err = match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    };
    if cli_err.code != PERMISSION_DENIED && cli_err.code != INTERNAL {
        cli_err.message = format!("{} ({hint})", cli_err.message);
    }
    cli_err
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. }
        | FrameError::FrameTooLarge { .. }
        | FrameError::InvalidName { .. }
        | FrameError::MalformedHeader(_)
        | FrameError::UnknownFrameKind(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Io(err) => io_error(context, err),
        PeerError::SocketNotOpen(_)
        | PeerError::NotConnected
        | PeerError::RouteNotFound(_)
        | PeerError::NotFound(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use hubline_transport::ConnectionId;

    use super::*;

    #[test]
    fn refused_connect_is_failure_with_hint() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                addr: "127.0.0.1:9".parse().unwrap(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.contains("make sure the hub is running"));
    }

    #[test]
    fn timed_out_connect_is_timeout() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                addr: "10.0.0.1:8080".parse().unwrap(),
                source: io::Error::from(io::ErrorKind::TimedOut),
            },
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn invalid_name_is_data_invalid() {
        let err = peer_error(
            "send failed",
            PeerError::Frame(FrameError::InvalidName {
                name: "a;b".to_string(),
                reason: "contains ';'",
            }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn unknown_route_is_failure() {
        let err = peer_error("send failed", PeerError::RouteNotFound(ConnectionId::new(4)));
        assert_eq!(err.code, FAILURE);
        assert_eq!(err.to_string(), "send failed: no connection with id 4");
    }

    #[test]
    fn stopped_hub_is_internal() {
        assert_eq!(peer_error("list failed", PeerError::HubStopped).code, INTERNAL);
    }
}
