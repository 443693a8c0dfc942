#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use hubline_frame::{Frame, FrameKind, FrameReader, FrameWriter};
use serde_json::Value;

const WAIT: Duration = Duration::from_secs(5);

fn local_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener should have an address")
        .to_string();
    (listener, addr)
}

fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = listener.accept().expect("client should connect");
    stream
        .set_read_timeout(Some(WAIT))
        .expect("read timeout should apply");
    stream
}

#[test]
fn send_delivers_one_message() {
    let (listener, addr) = local_listener();

    let output = Command::new(env!("CARGO_BIN_EXE_hubline"))
        .args(["--format", "json", "send", "--addr", &addr, "--message", "hello"])
        .output()
        .expect("send should run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let record: Value = serde_json::from_str(stdout.trim()).expect("send should emit json");
    assert_eq!(record["event"], "sent");
    assert_eq!(record["size"], 5);

    let mut reader = FrameReader::new(accept(&listener));
    let frame = reader.read_frame().expect("frame should arrive");
    assert_eq!(frame, Frame::message("hello"));
}

#[test]
fn send_delivers_file_as_attachment() {
    let (listener, addr) = local_listener();
    let path = std::env::temp_dir().join(format!("hubline-send-{}.txt", std::process::id()));
    std::fs::write(&path, b"0123456789").expect("payload file should be writable");

    let output = Command::new(env!("CARGO_BIN_EXE_hubline"))
        .args(["--format", "json", "send", "--addr", &addr, "--file"])
        .arg(&path)
        .output()
        .expect("send should run");
    assert!(output.status.success());

    let mut reader = FrameReader::new(accept(&listener));
    let frame = reader.read_frame().expect("frame should arrive");
    assert_eq!(frame.kind, FrameKind::Attachment);
    assert_eq!(frame.name, path.file_name().unwrap().to_str().unwrap());
    assert_eq!(frame.payload.as_ref(), b"0123456789");
    assert_eq!(frame.extension(), Some("txt"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn send_to_closed_port_exits_1() {
    let (listener, addr) = local_listener();
    drop(listener);

    let output = Command::new(env!("CARGO_BIN_EXE_hubline"))
        .args(["send", "--addr", &addr, "--message", "hello"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
}

#[test]
fn send_without_payload_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_hubline"))
        .args(["send", "--addr", "127.0.0.1:1"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn connect_exchanges_frames_until_hub_closes() {
    let (listener, addr) = local_listener();

    let mut child = Command::new(env!("CARGO_BIN_EXE_hubline"))
        .args(["--log-level", "error", "--format", "json", "connect", "--addr", &addr])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("connect command should start");

    let stream = accept(&listener);
    let mut reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
    let mut writer = FrameWriter::new(stream);

    let stdout = child.stdout.take().expect("stdout should be piped");
    let (tx, lines) = mpsc::channel::<Value>();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Ok(value) = serde_json::from_str(&line) {
                if tx.send(value).is_err() {
                    break;
                }
            }
        }
    });
    let expect_event = |event: &str| -> Value {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let value = lines
                .recv_timeout(remaining)
                .unwrap_or_else(|_| panic!("timed out waiting for '{event}'"));
            if value["event"] == event {
                return value;
            }
        }
    };
    expect_event("connection_opened");

    let mut stdin = child.stdin.take().expect("stdin should be piped");
    writeln!(stdin, "hello hub").expect("stdin should accept text");
    stdin.flush().expect("stdin should flush");
    let frame = reader.read_frame().expect("typed text should arrive");
    assert_eq!(frame, Frame::message("hello hub"));

    writer.send_message("hello peer").expect("reply should send");
    let received = expect_event("frame_received");
    assert_eq!(received["payload"], "hello peer");

    drop(reader);
    drop(writer);
    expect_event("connection_closed");

    let deadline = Instant::now() + WAIT;
    let status = loop {
        if let Some(status) = child.try_wait().expect("status should be readable") {
            break status;
        }
        assert!(Instant::now() < deadline, "connect did not exit");
        thread::sleep(Duration::from_millis(25));
    };
    assert_eq!(status.code(), Some(0));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_hubline"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("hubline {}", env!("CARGO_PKG_VERSION")));
}
