//! Frames and their length-prefixed wire encoding.

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{FrameError, Result};
use crate::header::{WireHeader, HEADER_SIZE};
use crate::kind::FrameKind;

/// Length prefix: 4-byte big-endian body length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum body size (header + payload): 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// Prefix value the stream format reserves for a null byte array.
const NULL_ARRAY_MARKER: u32 = u32::MAX;

/// Largest body the 32-bit prefix can describe.
const MAX_ENCODABLE_BODY: usize = (NULL_ARRAY_MARKER - 1) as usize;

/// A decoded message or attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message or attachment.
    pub kind: FrameKind,
    /// Attachment file name; empty for messages.
    pub name: String,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// A text message.
    pub fn message(text: impl Into<Bytes>) -> Self {
        Self {
            kind: FrameKind::Message,
            name: String::new(),
            payload: text.into(),
        }
    }

    /// A named attachment. Fails if the name cannot travel in the header.
    pub fn attachment(name: impl Into<String>, payload: impl Into<Bytes>) -> Result<Self> {
        let name = name.into();
        validate_attachment_name(&name)?;
        Ok(Self {
            kind: FrameKind::Attachment,
            name,
            payload: payload.into(),
        })
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Text after the last `.` of the attachment name, used as a save filter.
    pub fn extension(&self) -> Option<&str> {
        match self.kind {
            FrameKind::Message => None,
            FrameKind::Attachment => extension_of(&self.name),
        }
    }

    /// The payload as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// The header this frame encodes to.
    pub fn header(&self) -> WireHeader {
        WireHeader::new(self.kind, &self.name, self.payload.len())
    }

    /// The total wire size of this frame (prefix + header + payload).
    pub fn wire_size(&self) -> usize {
        LENGTH_PREFIX_SIZE + HEADER_SIZE + self.payload.len()
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.kind, &self.name, &self.payload, &mut dst)?;
        Ok(dst.freeze())
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Check that an attachment name survives the header unchanged.
///
/// Names must be non-empty, carry an extension, and avoid the header's
/// separator characters. Length is not limited: over-long names are truncated
/// on the wire like any other header text.
pub fn validate_attachment_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(FrameError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("name must not be empty");
    }
    if name.contains([',', ':', ';']) {
        return invalid("name must not contain ',', ':' or ';'");
    }
    if name.contains('\0') {
        return invalid("name must not contain NUL");
    }
    if extension_of(name).is_none() {
        return invalid("name must have a file extension");
    }
    Ok(())
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────────┬──────────────────┐
/// │ Length (4B)  │ Header (128B, NUL padded)     │ Payload          │
/// │ big-endian   │ fileType:..,fileName:..,      │ (Length - 128 B) │
/// │ header+pay.  │ fileSize:..;                  │                  │
/// └──────────────┴──────────────────────────────┴──────────────────┘
/// ```
pub fn encode_frame(
    kind: FrameKind,
    name: &str,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if kind == FrameKind::Attachment {
        validate_attachment_name(name)?;
    }

    let body_len = HEADER_SIZE + payload.len();
    if body_len > MAX_ENCODABLE_BODY {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_ENCODABLE_BODY - HEADER_SIZE,
        });
    }

    let header = WireHeader::new(kind, name, payload.len());
    if !header.fits() {
        debug!(
            kind = %kind,
            header_len = header.render().len(),
            "header text exceeds {HEADER_SIZE} bytes and will be truncated"
        );
    }

    dst.reserve(LENGTH_PREFIX_SIZE + body_len);
    dst.put_u32(body_len as u32);
    dst.put_slice(&header.to_bytes());
    dst.put_slice(payload);
    Ok(())
}

/// Read the body length announced by a length prefix.
///
/// Returns `None` until all four prefix bytes are present. The null-array
/// marker announces an empty body.
pub fn peek_body_len(src: &[u8]) -> Option<usize> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = src.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    match u32::from_be_bytes(prefix) {
        NULL_ARRAY_MARKER => Some(0),
        len => Some(len as usize),
    }
}

/// Decode a frame body (header + payload, without the length prefix).
///
/// The payload length is authoritative; the declared `fileSize` is only
/// compared for diagnostics because truncation can corrupt it.
pub fn decode_body(body: Bytes) -> Result<Frame> {
    if body.len() < HEADER_SIZE {
        return Err(FrameError::MalformedHeader(format!(
            "body is {} bytes, header needs {HEADER_SIZE}",
            body.len()
        )));
    }

    let header = WireHeader::parse(&body[..HEADER_SIZE])?;
    let kind = header.kind()?;
    let payload = body.slice(HEADER_SIZE..);

    if header.declared_size() != Some(payload.len() as u64) {
        debug!(
            declared = %header.file_size,
            actual = payload.len(),
            "header size disagrees with payload"
        );
    }

    let name = match kind {
        FrameKind::Message => String::new(),
        FrameKind::Attachment if header.file_name.is_empty() => {
            return Err(FrameError::MalformedHeader(
                "attachment without a file name".to_string(),
            ));
        }
        FrameKind::Attachment => header.file_name,
    };

    Ok(Frame {
        kind,
        name,
        payload,
    })
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes (header + payload). Default: 16 MiB.
    pub max_body_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
