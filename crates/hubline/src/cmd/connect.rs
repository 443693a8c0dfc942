use std::path::PathBuf;

use hubline_frame::DEFAULT_MAX_BODY;
use hubline_peer::{dispatch, Event, PeerSession, SessionConfig};
use hubline_transport::resolve;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::cmd::{parse_duration, read_attachment, runtime, ConnectArgs};
use crate::console::Console;
use crate::exit::{io_error, peer_error, transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::{OutputFormat, Record};
use crate::store::DirectoryStore;

/// A line typed into the session's stdin.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Message(String),
    File(PathBuf),
    Quit,
}

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let runtime = runtime()?;
    let result = runtime.block_on(session(args, format));
    runtime.shutdown_background();
    result
}

async fn session(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let hub_addr = resolve(&args.addr).map_err(|err| transport_error("invalid --addr", err))?;
    let config = SessionConfig {
        hub_addr,
        connect_timeout: Some(parse_duration(&args.timeout)?),
        max_body_size: args.max_body_size.unwrap_or(DEFAULT_MAX_BODY),
        ..SessionConfig::default()
    };
    let (mut session, mut events) = PeerSession::connect(config)
        .await
        .map_err(|err| peer_error("connect failed", err))?;

    let mut console = Console::new(format, args.accept_attachments);
    let store = DirectoryStore::new(&args.save_dir);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut code = SUCCESS;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    let terminal = event.is_terminal();
                    if matches!(event, Event::ConnectionError { .. }) {
                        code = FAILURE;
                    }
                    dispatch(event, &mut console, &store);
                    if terminal {
                        break;
                    }
                }
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(SessionCommand::Quit) => break,
                    Some(command) => execute(&session, command, &console).await,
                    None => {}
                },
                Ok(None) => {
                    debug!("stdin closed; waiting for the hub");
                    stdin_open = false;
                }
                Err(err) => return Err(io_error("stdin read failed", err)),
            },
        }
    }

    session.shutdown().await;
    while let Ok(event) = events.try_recv() {
        dispatch(event, &mut console, &store);
    }
    Ok(code)
}

async fn execute(session: &PeerSession, command: SessionCommand, console: &Console) {
    let result = match command {
        SessionCommand::Message(text) => session
            .send_message(text)
            .map_err(|err| peer_error("send failed", err)),
        SessionCommand::File(path) => match read_attachment(&path).await {
            Ok((name, payload)) => session
                .send_attachment(name, payload)
                .map_err(|err| peer_error("send failed", err)),
            Err(err) => Err(err),
        },
        SessionCommand::Quit => return,
    };

    let record = match result {
        Ok(()) => {
            let mut record = Record::new("sent").connection(session.id());
            record.address = Some(session.hub_addr().to_string());
            record
        }
        Err(err) => Record::new("send_failed").error(err),
    };
    console.print(record);
}

/// Parse one stdin line; anything that is not a command is sent as text.
fn parse_command(line: &str) -> Option<SessionCommand> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let trimmed = line.trim_start();
    if trimmed == "quit" || trimmed == "exit" {
        return Some(SessionCommand::Quit);
    }
    if let Some(text) = trimmed.strip_prefix("msg ") {
        return Some(SessionCommand::Message(text.to_string()));
    }
    if let Some(path) = trimmed.strip_prefix("file ") {
        let path = path.trim();
        if !path.is_empty() {
            return Some(SessionCommand::File(PathBuf::from(path)));
        }
    }
    Some(SessionCommand::Message(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_text_is_a_message() {
        assert_eq!(
            parse_command("hello hub"),
            Some(SessionCommand::Message("hello hub".to_string()))
        );
    }

    #[test]
    fn msg_prefix_is_stripped() {
        assert_eq!(
            parse_command("msg  two spaces"),
            Some(SessionCommand::Message(" two spaces".to_string()))
        );
    }

    #[test]
    fn file_and_quit() {
        assert_eq!(
            parse_command("file /tmp/a.txt"),
            Some(SessionCommand::File(PathBuf::from("/tmp/a.txt")))
        );
        assert_eq!(parse_command("quit"), Some(SessionCommand::Quit));
    }

    #[test]
    fn file_without_path_is_text() {
        assert_eq!(
            parse_command("file "),
            Some(SessionCommand::Message("file ".to_string()))
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  \r"), None);
    }
}
