//! The fixed-size text header that precedes every payload.
//!
//! ```text
//! fileType:<message|attachment>,fileName:<name|null>,fileSize:<N>;\0\0\0...
//! └──────────────────────────── exactly 128 bytes ────────────────────────┘
//! ```
//!
//! The format has no escaping. A name containing `,` `:` or `;` shifts the
//! fields apart, and text longer than 128 bytes is cut off, which drops the
//! tail of `fileSize` (and of `fileName` for very long names). Both behaviours
//! are kept for compatibility with existing peers; encoders reject names with
//! separators through [`validate_attachment_name`](crate::validate_attachment_name).

use crate::error::{FrameError, Result};
use crate::kind::FrameKind;

/// Size of the header block in bytes.
pub const HEADER_SIZE: usize = 128;

/// `fileName` value written for messages.
pub const NULL_NAME: &str = "null";

const FIELD_SEPARATOR: char = ',';
const KEY_SEPARATOR: char = ':';
const TERMINATOR: char = ';';

/// The three header fields as text.
///
/// Values are kept as raw tokens so that a truncated header can still be
/// inspected; [`WireHeader::kind`] and [`WireHeader::declared_size`] interpret them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireHeader {
    /// Value of `fileType`.
    pub file_type: String,
    /// Value of `fileName`.
    pub file_name: String,
    /// Value of `fileSize`, cut at the first `;`.
    pub file_size: String,
}

impl WireHeader {
    /// Header describing a payload of `size` bytes.
    ///
    /// `name` is ignored for messages, which always carry [`NULL_NAME`].
    pub fn new(kind: FrameKind, name: &str, size: usize) -> Self {
        let file_name = match kind {
            FrameKind::Message => NULL_NAME.to_string(),
            FrameKind::Attachment => name.to_string(),
        };
        Self {
            file_type: kind.as_str().to_string(),
            file_name,
            file_size: size.to_string(),
        }
    }

    /// Full header text before padding or truncation.
    pub fn render(&self) -> String {
        format!(
            "fileType:{},fileName:{},fileSize:{};",
            self.file_type, self.file_name, self.file_size
        )
    }

    /// Whether [`render`](Self::render) fits the block without truncation.
    pub fn fits(&self) -> bool {
        self.render().len() <= HEADER_SIZE
    }

    /// The 128-byte block: rendered text, NUL padded or truncated.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let text = self.render();
        let mut block = [0u8; HEADER_SIZE];
        let n = text.len().min(HEADER_SIZE);
        block[..n].copy_from_slice(&text.as_bytes()[..n]);
        block
    }

    /// Parse a header block.
    ///
    /// Text ends at the first NUL. Only the first three comma-separated fields
    /// are read; keys are not checked, matching what deployed peers accept.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let raw = &raw[..raw.len().min(HEADER_SIZE)];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = String::from_utf8_lossy(&raw[..end]);

        let mut fields = text.split(FIELD_SEPARATOR);
        let (Some(file_type), Some(file_name), Some(file_size)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(FrameError::MalformedHeader(format!(
                "expected 3 fields in {text:?}"
            )));
        };

        let file_size = field_value(file_size)?;
        let file_size = file_size
            .split_once(TERMINATOR)
            .map_or(file_size, |(value, _)| value);

        Ok(Self {
            file_type: field_value(file_type)?.to_string(),
            file_name: field_value(file_name)?.to_string(),
            file_size: file_size.to_string(),
        })
    }

    /// Interpret `fileType`.
    pub fn kind(&self) -> Result<FrameKind> {
        self.file_type.parse()
    }

    /// Interpret `fileSize`; `None` if it is not a number (e.g. after truncation).
    pub fn declared_size(&self) -> Option<u64> {
        self.file_size.trim().parse().ok()
    }
}

fn field_value(field: &str) -> Result<&str> {
    field
        .split_once(KEY_SEPARATOR)
        .map(|(_, value)| value)
        .ok_or_else(|| {
            FrameError::MalformedHeader(format!("field {field:?} has no '{KEY_SEPARATOR}'"))
        })
}
