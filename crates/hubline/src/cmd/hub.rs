use std::path::PathBuf;

use hubline_frame::DEFAULT_MAX_BODY;
use hubline_peer::{dispatch, Hub, HubConfig, HubHandle, Selector};
use hubline_transport::resolve;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::cmd::{read_attachment, runtime, HubArgs};
use crate::console::Console;
use crate::exit::{io_error, peer_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{OutputFormat, Record};
use crate::store::DirectoryStore;

/// A line typed into the hub's stdin.
#[derive(Debug, PartialEq, Eq)]
enum HubCommand {
    Message { selector: Selector, text: String },
    File { selector: Selector, path: PathBuf },
    List,
    Quit,
}

pub fn run(args: HubArgs, format: OutputFormat) -> CliResult<i32> {
    let runtime = runtime()?;
    let result = runtime.block_on(serve(args, format));
    // stdin reads park a blocking thread that never returns on its own.
    runtime.shutdown_background();
    result
}

async fn serve(args: HubArgs, format: OutputFormat) -> CliResult<i32> {
    let bind_addr = resolve(&args.bind).map_err(|err| transport_error("invalid --bind", err))?;
    let config = HubConfig {
        bind_addr,
        max_body_size: args.max_body_size.unwrap_or(DEFAULT_MAX_BODY),
        ..HubConfig::default()
    };
    let (hub, handle, mut events) = Hub::bind(config)
        .await
        .map_err(|err| peer_error("bind failed", err))?;

    let mut console = Console::new(format, args.accept_attachments);
    let store = DirectoryStore::new(&args.save_dir);
    let mut listening = Record::new("listening");
    listening.address = Some(handle.local_addr().to_string());
    listening.path = Some(store.root().display().to_string());
    console.print(listening);

    let hub_task = tokio::spawn(hub.run());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    // Commands run beside the loop so events keep draining while they wait.
    let mut in_flight = JoinSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    dispatch(event, &mut console, &store);
                }
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(HubCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        in_flight.spawn(execute(handle.clone(), command, console));
                    }
                    Ok(None) => {}
                    Err(message) => console.print(Record::new("command_error").error(message)),
                },
                Ok(None) => {
                    debug!("stdin closed; serving until interrupted");
                    stdin_open = false;
                }
                Err(err) => return Err(io_error("stdin read failed", err)),
            },
            Some(joined) = in_flight.join_next() => {
                if let Err(err) = joined {
                    warn!(error = %err, "hub command task failed");
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            warn!(error = %err, "hub command task failed");
        }
    }
    handle.shutdown();
    while let Some(event) = events.recv().await {
        dispatch(event, &mut console, &store);
    }
    hub_finished(hub_task.await)?;
    console.print(Record::new("stopped"));
    Ok(SUCCESS)
}

fn hub_finished(joined: Result<(), JoinError>) -> CliResult<()> {
    joined.map_err(|err| CliError::new(INTERNAL, format!("hub event loop failed: {err}")))
}

async fn execute(handle: HubHandle, command: HubCommand, console: Console) {
    let record = match command {
        HubCommand::Message { selector, text } => {
            sent_record(handle.send_message(selector, text).await)
        }
        HubCommand::File { selector, path } => match read_attachment(&path).await {
            Ok((name, payload)) => {
                sent_record(handle.send_attachment(selector, name, payload).await)
            }
            Err(err) => Record::new("command_error").error(err),
        },
        HubCommand::List => match handle.connections().await {
            Ok(ids) => {
                let mut record = Record::new("connections");
                record.connections = Some(ids.into_iter().map(|id| id.as_u64()).collect());
                record
            }
            Err(err) => Record::new("command_error").error(err),
        },
        HubCommand::Quit => return,
    };
    console.print(record);
}

fn sent_record(result: hubline_peer::Result<hubline_peer::RouteReport>) -> Record {
    match result {
        Ok(report) => {
            let mut record = Record::new("sent");
            record.connections = Some(report.delivered.iter().map(|id| id.as_u64()).collect());
            if !report.is_complete() {
                record.failed = Some(report.failed.iter().map(|(id, _)| id.as_u64()).collect());
            }
            record
        }
        Err(err) => Record::new("send_failed").error(err),
    }
}

/// Parse one stdin line. Blank lines yield `None`.
fn parse_command(line: &str) -> Result<Option<HubCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = split_word(line);

    match verb {
        "quit" | "exit" => Ok(Some(HubCommand::Quit)),
        "list" => Ok(Some(HubCommand::List)),
        "msg" => {
            let (selector, text) = split_word(rest);
            if selector.is_empty() {
                return Err("usage: msg <selector> <text>".to_string());
            }
            Ok(Some(HubCommand::Message {
                selector: selector.parse()?,
                text: text.to_string(),
            }))
        }
        "file" => {
            let (selector, path) = split_word(rest);
            if selector.is_empty() || path.is_empty() {
                return Err("usage: file <selector> <path>".to_string());
            }
            Ok(Some(HubCommand::File {
                selector: selector.parse()?,
                path: PathBuf::from(path),
            }))
        }
        other => Err(format!(
            "unknown command '{other}': expected msg, file, list or quit"
        )),
    }
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (input, ""),
    }
}
