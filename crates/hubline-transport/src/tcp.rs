use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::WireStream;

/// Port used by both roles when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Hub listen address: all interfaces on [`DEFAULT_PORT`].
pub fn default_hub_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT)
}

/// Peer target address: loopback on [`DEFAULT_PORT`].
pub fn default_peer_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT)
}

/// Resolve `host:port` (or a bare host, which gets [`DEFAULT_PORT`]) to the first
/// matching socket address.
pub fn resolve(input: &str) -> Result<SocketAddr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TransportError::InvalidAddress {
            input: input.to_string(),
            reason: "address must not be empty".to_string(),
        });
    }

    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    let candidate = if input.contains(':') {
        input.to_string()
    } else {
        format!("{input}:{DEFAULT_PORT}")
    };

    let mut addrs = candidate
        .to_socket_addrs()
        .map_err(|err| TransportError::InvalidAddress {
            input: input.to_string(),
            reason: err.to_string(),
        })?;

    addrs.next().ok_or_else(|| TransportError::InvalidAddress {
        input: input.to_string(),
        reason: "no addresses resolved".to_string(),
    })
}

/// Blocking TCP listener.
///
/// Accepted streams carry their [`ConnectionId`](crate::ConnectionId).
pub struct TcpEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on `addr`. Port 0 picks an ephemeral port.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|e| TransportError::Bind { addr, source: e })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind { addr, source: e })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<WireStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        let stream = WireStream::from_tcp(stream);
        debug!(%peer, connection_id = %stream.id(), "accepted connection");
        Ok(stream)
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(addr: SocketAddr) -> Result<WireStream> {
        let stream =
            TcpStream::connect(addr).map_err(|e| TransportError::Connect { addr, source: e })?;
        let stream = WireStream::from_tcp(stream);
        debug!(%addr, connection_id = %stream.id(), "connected over tcp");
        Ok(stream)
    }

    /// Connect with an upper bound on the time spent establishing the connection.
    pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<WireStream> {
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| TransportError::Connect { addr, source: e })?;
        let stream = WireStream::from_tcp(stream);
        debug!(%addr, connection_id = %stream.id(), "connected over tcp");
        Ok(stream)
    }

    /// The address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Bind a tokio listener on `addr`.
#[cfg(feature = "async")]
pub async fn bind_async(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TransportError::Bind { addr, source: e })?;
    if let Ok(local_addr) = listener.local_addr() {
        info!(%local_addr, "listening on tcp");
    }
    Ok(listener)
}

/// Connect a tokio stream to `addr`, optionally bounded by `timeout`.
#[cfg(feature = "async")]
pub async fn connect_async(
    addr: SocketAddr,
    timeout: Option<Duration>,
) -> Result<tokio::net::TcpStream> {
    let connect = tokio::net::TcpStream::connect(addr);
    let stream = match timeout {
        Some(limit) => match tokio::time::timeout(limit, connect).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no connection within {limit:?}"),
            )),
        },
        None => connect.await,
    }
    .map_err(|e| TransportError::Connect { addr, source: e })?;

    debug!(%addr, "connected over tcp");
    Ok(stream)
}
