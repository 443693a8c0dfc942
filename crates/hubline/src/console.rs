use std::io;
use std::net::SocketAddr;
use std::path::Path;

use hubline_frame::{Frame, FrameError};
use hubline_peer::{
    AttachmentDecision, AttachmentOffer, ConnectionErrorKind, ConnectionId, Presentation,
};

use crate::output::{print_record, OutputFormat, Record};

/// Prints connection events as records on stdout.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    format: OutputFormat,
    accept_attachments: bool,
}

impl Console {
    pub fn new(format: OutputFormat, accept_attachments: bool) -> Self {
        Self {
            format,
            accept_attachments,
        }
    }

    pub fn print(&self, record: Record) {
        print_record(&record, self.format);
    }
}

impl Presentation for Console {
    fn on_connection_opened(&mut self, id: ConnectionId, peer_addr: Option<SocketAddr>) {
        let mut record = Record::new("connection_opened").connection(id);
        record.address = peer_addr.map(|addr| addr.to_string());
        self.print(record);
    }

    fn on_connection_closed(&mut self, id: ConnectionId) {
        self.print(Record::new("connection_closed").connection(id));
    }

    fn on_connection_error(&mut self, id: ConnectionId, kind: ConnectionErrorKind, message: &str) {
        let mut record = Record::new("connection_error")
            .connection(id)
            .error(message);
        record.kind = Some(kind.to_string());
        record.hint = Some(kind.hint().to_string());
        self.print(record);
    }

    fn on_frame_received(&mut self, id: ConnectionId, frame: &Frame) {
        self.print(Record::new("frame_received").connection(id).frame(frame));
    }

    fn on_frame_dropped(&mut self, id: ConnectionId, error: &FrameError) {
        self.print(Record::new("frame_dropped").connection(id).error(error));
    }

    fn confirm_attachment(&mut self, _offer: &AttachmentOffer) -> AttachmentDecision {
        if self.accept_attachments {
            AttachmentDecision::Accept
        } else {
            AttachmentDecision::Reject
        }
    }

    fn on_attachment_stored(&mut self, offer: &AttachmentOffer, path: &Path) {
        let mut record = Record::new("attachment_stored").connection(offer.id);
        record.name = Some(offer.name.clone());
        record.size = Some(offer.size);
        record.path = Some(path.display().to_string());
        self.print(record);
    }

    fn on_attachment_discarded(&mut self, offer: &AttachmentOffer) {
        let mut record = Record::new("attachment_discarded").connection(offer.id);
        record.name = Some(offer.name.clone());
        record.size = Some(offer.size);
        self.print(record);
    }

    fn on_attachment_store_failed(&mut self, offer: &AttachmentOffer, error: &io::Error) {
        let mut record = Record::new("attachment_store_failed")
            .connection(offer.id)
            .error(error);
        record.name = Some(offer.name.clone());
        self.print(record);
    }
}
