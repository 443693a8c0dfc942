use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hubline_frame::{Frame, FrameKind};
use hubline_transport::ConnectionId;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line of command output.
///
/// JSON output carries only the fields that are set; table and pretty
/// output fold them into a single detail column.
#[derive(Serialize, Debug, Default)]
pub struct Record {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub timestamp: String,
}

impl Record {
    pub fn new(event: &'static str) -> Self {
        Self {
            event,
            timestamp: now_unix_seconds(),
            ..Self::default()
        }
    }

    pub fn connection(mut self, id: ConnectionId) -> Self {
        self.connection_id = Some(id.as_u64());
        self
    }

    /// Describe a received frame: text for messages, name and size for
    /// attachments.
    pub fn frame(mut self, frame: &Frame) -> Self {
        self.kind = Some(frame.kind.to_string());
        self.size = Some(frame.size());
        match frame.kind {
            FrameKind::Message => self.payload = Some(payload_preview(frame.payload.as_ref())),
            FrameKind::Attachment => self.name = Some(frame.name.clone()),
        }
        self
    }

    pub fn error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    fn detail(&self) -> String {
        let mut parts = Vec::new();
        if let Some(address) = &self.address {
            parts.push(format!("address={address}"));
        }
        if let Some(kind) = &self.kind {
            parts.push(format!("kind={kind}"));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name={name}"));
        }
        if let Some(size) = self.size {
            parts.push(format!("size={size}"));
        }
        if let Some(path) = &self.path {
            parts.push(format!("path={path}"));
        }
        if let Some(connections) = &self.connections {
            parts.push(format!("connections={}", join_ids(connections)));
        }
        if let Some(failed) = &self.failed {
            parts.push(format!("failed={}", join_ids(failed)));
        }
        if let Some(error) = &self.error {
            parts.push(format!("error={error}"));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("hint={hint}"));
        }
        if let Some(payload) = &self.payload {
            parts.push(format!("payload={payload}"));
        }
        parts.join(" ")
    }
}

pub fn print_record(record: &Record, format: OutputFormat) {
    let connection = record
        .connection_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "CONNECTION", "DETAIL"])
                .add_row(vec![record.event.to_string(), connection, record.detail()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "event={} connection={} {}",
                record.event,
                connection,
                record.detail()
            );
        }
    }
}

fn join_ids(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_skips_unset_fields() {
        let record = Record::new("connection_closed").connection(ConnectionId::new(9));
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();

        assert_eq!(value["event"], "connection_closed");
        assert_eq!(value["connection_id"], 9);
        assert!(value.get("payload").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn message_record_carries_text() {
        let record = Record::new("frame_received").frame(&Frame::message("hello"));
        assert_eq!(record.kind.as_deref(), Some("message"));
        assert_eq!(record.payload.as_deref(), Some("hello"));
        assert_eq!(record.size, Some(5));
        assert!(record.name.is_none());
    }

    #[test]
    fn attachment_record_carries_name_not_bytes() {
        let frame = Frame::attachment("a.txt", vec![0u8; 10]).unwrap();
        let record = Record::new("frame_received").frame(&frame);
        assert_eq!(record.name.as_deref(), Some("a.txt"));
        assert_eq!(record.size, Some(10));
        assert!(record.payload.is_none());
        assert_eq!(record.detail(), "kind=attachment name=a.txt size=10");
    }

    #[test]
    fn binary_message_is_summarised() {
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }

    #[test]
    fn empty_id_list_reads_none() {
        assert_eq!(join_ids(&[]), "none");
        assert_eq!(join_ids(&[3, 7]), "3,7");
    }
}
