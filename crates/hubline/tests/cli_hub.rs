#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use hubline_frame::{FrameKind, FrameReader, FrameWriter};
use serde_json::Value;

const WAIT: Duration = Duration::from_secs(5);

struct HubProcess {
    child: Child,
    stdin: ChildStdin,
    lines: mpsc::Receiver<Value>,
}

impl HubProcess {
    fn spawn(extra: &[&str]) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_hubline"))
            .args(["--log-level", "error", "--format", "json", "hub", "--bind", "127.0.0.1:0"])
            .args(extra)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("hub command should start");

        let stdin = child.stdin.take().expect("stdin should be piped");
        let stdout = child.stdout.take().expect("stdout should be piped");
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if let Ok(value) = serde_json::from_str::<Value>(&line) {
                    if tx.send(value).is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            child,
            stdin,
            lines,
        }
    }

    /// Next output record with the given `event`, skipping others.
    fn expect_event(&self, event: &str) -> Value {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let value = self
                .lines
                .recv_timeout(remaining)
                .unwrap_or_else(|_| panic!("timed out waiting for '{event}'"));
            if value["event"] == event {
                return value;
            }
        }
    }

    fn command(&mut self, line: &str) {
        writeln!(self.stdin, "{line}").expect("hub stdin should accept commands");
        self.stdin.flush().expect("hub stdin should flush");
    }

    fn wait_exit(&mut self) -> Option<i32> {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait().expect("hub status should be readable") {
                return status.code();
            }
            thread::sleep(Duration::from_millis(25));
        }
        panic!("hub did not exit");
    }
}

impl Drop for HubProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn connect(address: &Value) -> (FrameReader<TcpStream>, FrameWriter<TcpStream>) {
    let address = address.as_str().expect("address should be a string");
    let stream = TcpStream::connect(address).expect("hub should accept connections");
    stream
        .set_read_timeout(Some(WAIT))
        .expect("read timeout should apply");
    let reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
    (reader, FrameWriter::new(stream))
}

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "hubline-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

#[test]
fn hub_relays_messages_and_lists_connections() {
    let mut hub = HubProcess::spawn(&[]);
    let listening = hub.expect_event("listening");
    let (mut reader, mut writer) = connect(&listening["address"]);

    let opened = hub.expect_event("connection_opened");
    let id = opened["connection_id"].as_u64().expect("id should be numeric");

    writer.send_message("hello hub").expect("message should send");
    let received = hub.expect_event("frame_received");
    assert_eq!(received["connection_id"], id);
    assert_eq!(received["kind"], "message");
    assert_eq!(received["payload"], "hello hub");

    hub.command("list");
    let listed = hub.expect_event("connections");
    assert_eq!(listed["connections"], serde_json::json!([id]));

    hub.command("msg Broadcast hi there");
    let frame = reader.read_frame().expect("broadcast should arrive");
    assert_eq!(frame.kind, FrameKind::Message);
    assert_eq!(frame.payload.as_ref(), b"hi there");
    assert_eq!(hub.expect_event("sent")["connections"], serde_json::json!([id]));

    hub.command(&format!("msg {id} just you"));
    let frame = reader.read_frame().expect("direct message should arrive");
    assert_eq!(frame.payload.as_ref(), b"just you");

    hub.command("quit");
    assert_eq!(hub.wait_exit(), Some(0));
}

#[test]
fn hub_answers_list_after_a_burst_of_frames() {
    let mut hub = HubProcess::spawn(&[]);
    let listening = hub.expect_event("listening");
    let (_reader, mut writer) = connect(&listening["address"]);
    let id = hub.expect_event("connection_opened")["connection_id"]
        .as_u64()
        .expect("id should be numeric");

    for n in 0..400 {
        writer
            .send_message(format!("burst {n}"))
            .expect("message should send");
    }
    hub.command("list");

    let listed = hub.expect_event("connections");
    assert_eq!(listed["connections"], serde_json::json!([id]));

    hub.command("quit");
    assert_eq!(hub.wait_exit(), Some(0));
}

#[test]
fn hub_reports_unknown_route_and_closed_connection() {
    let mut hub = HubProcess::spawn(&[]);
    let listening = hub.expect_event("listening");

    let (reader, writer) = connect(&listening["address"]);
    let id = hub.expect_event("connection_opened")["connection_id"]
        .as_u64()
        .expect("id should be numeric");

    drop(reader);
    drop(writer);
    let closed = hub.expect_event("connection_closed");
    assert_eq!(closed["connection_id"], id);

    hub.command(&format!("msg {id} anyone?"));
    let failed = hub.expect_event("send_failed");
    assert!(failed["error"]
        .as_str()
        .map(|e| e.contains("no connection"))
        .unwrap_or(false));

    hub.command("bogus");
    hub.expect_event("command_error");
}

#[test]
fn hub_saves_accepted_attachment() {
    let dir = unique_temp_dir("attach");
    let dir_arg = dir.to_string_lossy().into_owned();
    let hub = HubProcess::spawn(&["--accept-attachments", "--save-dir", &dir_arg]);
    let listening = hub.expect_event("listening");
    let (_reader, mut writer) = connect(&listening["address"]);
    hub.expect_event("connection_opened");

    writer
        .send_attachment("notes.txt", b"0123456789")
        .expect("attachment should send");

    let received = hub.expect_event("frame_received");
    assert_eq!(received["kind"], "attachment");
    assert_eq!(received["name"], "notes.txt");
    assert_eq!(received["size"], 10);

    let stored = hub.expect_event("attachment_stored");
    let path = PathBuf::from(stored["path"].as_str().expect("path should be a string"));
    assert_eq!(path, dir.join("notes.txt"));
    assert_eq!(std::fs::read(&path).expect("file should exist"), b"0123456789");

    drop(hub);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn hub_discards_attachments_by_default() {
    let dir = unique_temp_dir("discard");
    let dir_arg = dir.to_string_lossy().into_owned();
    let hub = HubProcess::spawn(&["--save-dir", &dir_arg]);
    let listening = hub.expect_event("listening");
    let (_reader, mut writer) = connect(&listening["address"]);
    hub.expect_event("connection_opened");

    writer
        .send_attachment("notes.txt", b"ignored")
        .expect("attachment should send");

    let discarded = hub.expect_event("attachment_discarded");
    assert_eq!(discarded["name"], "notes.txt");
    assert!(!dir.join("notes.txt").exists());

    drop(hub);
    let _ = std::fs::remove_dir_all(&dir);
}
