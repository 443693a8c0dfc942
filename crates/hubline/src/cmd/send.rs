use std::fs;

use hubline_frame::{FrameConfig, FrameWriter};
use hubline_transport::{resolve, TcpEndpoint};
use tracing::debug;

use crate::cmd::{attachment_name, parse_duration, SendArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, OutputFormat, Record};

/// What `send` puts on the wire.
#[derive(Debug, PartialEq, Eq)]
enum Outgoing {
    Message(String),
    Attachment { name: String, payload: Vec<u8> },
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let addr = resolve(&args.addr).map_err(|err| transport_error("invalid --addr", err))?;
    let timeout = parse_duration(&args.timeout)?;
    let outgoing = resolve_payload(&args)?;

    let stream = TcpEndpoint::connect_timeout(addr, timeout)
        .map_err(|err| transport_error("connect failed", err))?;
    let id = stream.id();
    let config = FrameConfig {
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config_tcp(stream, config)
        .map_err(|err| frame_error("connect failed", err))?;

    let mut record = Record::new("sent").connection(id);
    record.address = Some(addr.to_string());
    match &outgoing {
        Outgoing::Message(text) => {
            writer
                .send_message(text)
                .map_err(|err| frame_error("send failed", err))?;
            record.kind = Some("message".to_string());
            record.size = Some(text.len());
        }
        Outgoing::Attachment { name, payload } => {
            writer
                .send_attachment(name, payload)
                .map_err(|err| frame_error("send failed", err))?;
            record.kind = Some("attachment".to_string());
            record.name = Some(name.clone());
            record.size = Some(payload.len());
        }
    }
    debug!(connection_id = %id, %addr, "frame sent");

    print_record(&record, format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Outgoing> {
    if let Some(text) = &args.message {
        return Ok(Outgoing::Message(text.clone()));
    }
    if let Some(path) = &args.file {
        let name = attachment_name(path)?;
        let payload = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok(Outgoing::Attachment { name, payload });
    }
    Err(CliError::new(USAGE, "one of --message or --file is required"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args(message: Option<&str>, file: Option<PathBuf>) -> SendArgs {
        SendArgs {
            addr: "127.0.0.1:8080".to_string(),
            message: message.map(str::to_string),
            file,
            timeout: "5s".to_string(),
        }
    }

    #[test]
    fn message_payload_is_text() {
        assert_eq!(
            resolve_payload(&args(Some("hi"), None)).unwrap(),
            Outgoing::Message("hi".to_string())
        );
    }

    #[test]
    fn missing_file_is_usage_error() {
        let missing = std::env::temp_dir().join(format!(
            "hubline-missing-{}-{}.bin",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        let err = resolve_payload(&args(None, Some(missing))).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn no_payload_is_usage_error() {
        assert_eq!(resolve_payload(&args(None, None)).unwrap_err().code, USAGE);
    }
}
