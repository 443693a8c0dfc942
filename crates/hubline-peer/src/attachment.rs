//! Attachment offers and the storage collaborator.

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use hubline_frame::Frame;
use hubline_transport::ConnectionId;

/// Persists accepted attachments.
///
/// Where the bytes end up is the implementation's choice; the returned path
/// is only reported back to the presentation layer.
pub trait AttachmentStore {
    fn store(&self, name: &str, payload: &[u8]) -> io::Result<PathBuf>;
}

/// An incoming attachment awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOffer {
    /// Connection the attachment arrived on.
    pub id: ConnectionId,
    /// File name from the header.
    pub name: String,
    /// Payload length in bytes.
    pub size: usize,
    /// Text after the last `.` of the name, usable as a save filter.
    pub extension: Option<String>,
}

impl AttachmentOffer {
    pub(crate) fn from_frame(id: ConnectionId, frame: &Frame) -> Self {
        Self {
            id,
            name: frame.name.clone(),
            size: frame.size(),
            extension: frame.extension().map(str::to_string),
        }
    }
}

/// Outcome of [`Presentation::confirm_attachment`](crate::Presentation::confirm_attachment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentDecision {
    /// Store the attachment now.
    Accept,
    /// Drop the attachment.
    Reject,
    /// Hand it back as a [`PendingAttachment`] to decide later.
    Defer,
}

/// An attachment whose decision was deferred. Dropping it discards the payload.
#[derive(Debug)]
pub struct PendingAttachment {
    offer: AttachmentOffer,
    payload: Bytes,
}

impl PendingAttachment {
    pub(crate) fn new(offer: AttachmentOffer, payload: Bytes) -> Self {
        Self { offer, payload }
    }

    pub fn offer(&self) -> &AttachmentOffer {
        &self.offer
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Persist the payload with `store`.
    pub fn accept(self, store: &dyn AttachmentStore) -> io::Result<PathBuf> {
        store.store(&self.offer.name, &self.payload)
    }

    /// Discard the payload, keeping the offer for reporting.
    pub fn reject(self) -> AttachmentOffer {
        self.offer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_describes_frame() {
        let frame = Frame::attachment("report.final.pdf", vec![0u8; 42]).unwrap();
        let offer = AttachmentOffer::from_frame(ConnectionId::new(5), &frame);

        assert_eq!(offer.id, ConnectionId::new(5));
        assert_eq!(offer.name, "report.final.pdf");
        assert_eq!(offer.size, 42);
        assert_eq!(offer.extension.as_deref(), Some("pdf"));
    }

    #[test]
    fn reject_returns_offer() {
        let frame = Frame::attachment("x.bin", vec![1u8, 2]).unwrap();
        let offer = AttachmentOffer::from_frame(ConnectionId::new(1), &frame);
        let pending = PendingAttachment::new(offer.clone(), frame.payload.clone());

        assert_eq!(pending.payload().len(), 2);
        assert_eq!(pending.reject(), offer);
    }
}
