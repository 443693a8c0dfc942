use std::fmt;
use std::str::FromStr;

/// Stable numeric identifier of one live connection.
///
/// Derived from the socket descriptor the OS assigned on accept/connect, so it is
/// unique among open sockets of this process. The same number doubles as the
/// user-visible routing selector, hence the `Display`/`FromStr` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw numeric id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Derive the id from an open socket's descriptor.
    #[cfg(unix)]
    pub fn from_socket<S: std::os::fd::AsRawFd>(socket: &S) -> Self {
        Self(u64::from(socket.as_raw_fd().unsigned_abs()))
    }

    /// Derive the id from an open socket's handle.
    #[cfg(windows)]
    pub fn from_socket<S: std::os::windows::io::AsRawSocket>(socket: &S) -> Self {
        Self(socket.as_raw_socket())
    }

    /// The raw numeric value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
