use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod connect;
pub mod hub;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept peers, print what they send and relay stdin commands to them.
    Hub(HubArgs),
    /// Connect to a hub and exchange messages through stdin/stdout.
    Connect(ConnectArgs),
    /// Send a single frame and exit.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Hub(args) => hub::run(args, format),
        Command::Connect(args) => connect::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct HubArgs {
    /// Address to listen on.
    #[arg(long, env = "HUBLINE_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,
    /// Directory accepted attachments are saved to.
    #[arg(long, env = "HUBLINE_SAVE_DIR", default_value = ".")]
    pub save_dir: PathBuf,
    /// Save incoming attachments instead of discarding them.
    #[arg(long)]
    pub accept_attachments: bool,
    /// Largest frame body accepted or sent, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_body_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Hub address.
    #[arg(long, env = "HUBLINE_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,
    /// Directory accepted attachments are saved to.
    #[arg(long, env = "HUBLINE_SAVE_DIR", default_value = ".")]
    pub save_dir: PathBuf,
    /// Save incoming attachments instead of discarding them.
    #[arg(long)]
    pub accept_attachments: bool,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Largest frame body accepted or sent, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_body_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Hub address.
    #[arg(long, env = "HUBLINE_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,
    /// Text message to send.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub message: Option<String>,
    /// File to send as an attachment.
    #[arg(long, conflicts_with = "message")]
    pub file: Option<PathBuf>,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// File name to announce for `path`.
pub(crate) fn attachment_name(path: &Path) -> CliResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CliError::new(
                USAGE,
                format!("{} has no usable file name", path.display()),
            )
        })
}

/// Read `path` for sending as an attachment named after its final component.
pub(crate) async fn read_attachment(path: &Path) -> CliResult<(String, Vec<u8>)> {
    let name = attachment_name(path)?;
    let payload = tokio::fs::read(path)
        .await
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    Ok((name, payload))
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))
}
