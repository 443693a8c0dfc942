/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The 128-byte header could not be split into its three fields.
    #[error("malformed frame header: {0}")]
    MalformedHeader(String),

    /// The header names a frame kind other than `message` or `attachment`.
    #[error("unknown frame kind '{0}'")]
    UnknownFrameKind(String),

    /// An attachment name the header format cannot carry.
    #[error("invalid attachment name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The payload does not fit the outbound limit or the 32-bit length prefix.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An inbound length prefix exceeds the configured maximum body size.
    #[error("frame too large (declared body {size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the stream is still aligned on a frame boundary after this error.
    ///
    /// Header and kind errors only drop the offending frame; everything else
    /// leaves the connection unusable.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            FrameError::MalformedHeader(_) | FrameError::UnknownFrameKind(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
