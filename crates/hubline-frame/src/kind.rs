//! Frame kinds carried in the `fileType` header field.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// What a frame's payload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Free text, UTF-8 on the wire.
    Message,
    /// Opaque file bytes with a file name.
    Attachment,
}

impl FrameKind {
    /// The `fileType` token written to the header.
    pub const fn as_str(self) -> &'static str {
        match self {
            FrameKind::Message => "message",
            FrameKind::Attachment => "attachment",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(FrameKind::Message),
            "attachment" => Ok(FrameKind::Attachment),
            other => Err(FrameError::UnknownFrameKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_roundtrip() {
        for kind in [FrameKind::Message, FrameKind::Attachment] {
            assert_eq!(kind.as_str().parse::<FrameKind>().unwrap(), kind);
        }
    }

    #[test]
    fn tokens_are_case_sensitive() {
        let err = "Message".parse::<FrameKind>().unwrap_err();
        assert!(matches!(err, FrameError::UnknownFrameKind(ref s) if s == "Message"));
    }
}
