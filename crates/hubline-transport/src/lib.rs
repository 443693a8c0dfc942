//! TCP transport layer for hubline.
//!
//! Provides the pieces every other crate builds on:
//! - [`ConnectionId`], the stable numeric key derived from a socket descriptor
//! - [`TcpEndpoint`] and [`WireStream`] for blocking accept/connect
//! - `bind_async` / `connect_async` returning tokio sockets (behind `async`)
//!
//! Nothing here knows about frames; this is raw byte transport.

pub mod error;
pub mod id;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use id::ConnectionId;
pub use stream::WireStream;
pub use tcp::{default_hub_addr, default_peer_addr, resolve, TcpEndpoint, DEFAULT_PORT};

#[cfg(feature = "async")]
pub use tcp::{bind_async, connect_async};
