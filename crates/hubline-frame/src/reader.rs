use std::io::{ErrorKind, Read};

use hubline_transport::WireStream;
use tracing::trace;

use crate::codec::{decode_body, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reassembler::StreamReassembler;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    reassembler: StreamReassembler,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            reassembler: StreamReassembler::with_max_body(config.max_body_size),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, also
    /// when EOF cuts a frame short. A frame whose header cannot be decoded is
    /// consumed and reported; the next call continues with the following frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let body = self.read_body()?;
        decode_body(body)
    }

    /// Read the next raw body (header + payload) without decoding it.
    pub fn read_body(&mut self) -> Result<bytes::Bytes> {
        loop {
            if let Some(body) = self.reassembler.next_body()? {
                trace!(body_len = body.len(), "frame body complete");
                return Ok(body);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.reassembler.push(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum body size for subsequent frames.
    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.config.max_body_size = max_body_size;
        self.reassembler.set_max_body(max_body_size);
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<WireStream> {
    /// Create a frame reader for a `WireStream` and apply the read timeout from config.
    pub fn with_config_tcp(inner: WireStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: hubline_transport::TransportError) -> FrameError {
    match err {
        hubline_transport::TransportError::Io(io)
        | hubline_transport::TransportError::Accept(io) => FrameError::Io(io),
        hubline_transport::TransportError::Bind { source, .. }
        | hubline_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
