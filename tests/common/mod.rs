//! Shared helpers for integration tests: a canned HTTP server and
//! [`NoteTranscriber`] doubles.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use basic_pitch_worker::model::validate_params;
use basic_pitch_worker::{DetectionParams, ModelError, NoteTranscriber, RawNoteEvent};

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn read_request_head(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }
}

fn response_head(status: u16, content_length: usize) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        content_length
    )
}

/// Accept connections until the test process exits, answering each with `respond`.
fn serve_with<F>(respond: F) -> SocketAddr
where
    F: Fn(&mut TcpStream) -> std::io::Result<()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let addr = listener.local_addr().expect("local addr");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            read_request_head(&mut stream);
            // the client may hang up early, that is what some tests want
            let _ = respond(&mut stream);
        }
    });

    addr
}

/// Serve `body` with `status` to every request.
pub fn serve(status: u16, body: Vec<u8>) -> SocketAddr {
    serve_with(move |stream| {
        stream.write_all(response_head(status, body.len()).as_bytes())?;
        stream.write_all(&body)?;
        stream.flush()
    })
}

/// Send the headers at once, then `body` one byte per `interval`.
pub fn serve_trickle(body: Vec<u8>, interval: Duration) -> SocketAddr {
    serve_with(move |stream| {
        stream.write_all(response_head(200, body.len()).as_bytes())?;
        stream.flush()?;
        for byte in &body {
            thread::sleep(interval);
            stream.write_all(std::slice::from_ref(byte))?;
            stream.flush()?;
        }
        Ok(())
    })
}

/// Advertise `content_length` bytes, send only `sent`, then close.
pub fn serve_truncated(content_length: usize, sent: usize) -> SocketAddr {
    serve_with(move |stream| {
        stream.write_all(response_head(200, content_length).as_bytes())?;
        stream.write_all(&vec![7u8; sent])?;
        stream.flush()?;
        stream.shutdown(Shutdown::Write)
    })
}

/// An address nothing is listening on.
pub fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr")
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).expect("read temp dir").next().is_none()
}

/// What a transcriber double observed during one call.
#[derive(Debug, Clone)]
pub struct Call {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub params: DetectionParams,
}

#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Succeed,
    Fail,
    Panic,
    /// Apply the Basic Pitch parameter checks, then succeed.
    Strict,
}

/// Records every call and answers according to its [`Behaviour`].
pub struct FakeTranscriber {
    behaviour: Behaviour,
    events: Vec<RawNoteEvent>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTranscriber {
    pub fn new(behaviour: Behaviour, events: Vec<RawNoteEvent>) -> Self {
        Self {
            behaviour,
            events,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl NoteTranscriber for FakeTranscriber {
    fn predict(&self, audio_path: &Path, params: &DetectionParams) -> Result<Vec<RawNoteEvent>, ModelError> {
        let bytes = std::fs::read(audio_path)?;
        self.calls.lock().unwrap().push(Call {
            path: audio_path.to_path_buf(),
            bytes,
            params: params.clone(),
        });

        match self.behaviour {
            Behaviour::Succeed => Ok(self.events.clone()),
            Behaviour::Fail => Err(ModelError::Audio("unsupported audio format".into())),
            Behaviour::Panic => panic!("model exploded"),
            Behaviour::Strict => {
                validate_params(params)?;
                Ok(self.events.clone())
            }
        }
    }
}

pub fn raw(start_time: f32, end_time: f32, pitch: u8, velocity: u8) -> RawNoteEvent {
    RawNoteEvent {
        start_time,
        end_time,
        pitch,
        velocity,
    }
}

pub fn sample_events() -> Vec<RawNoteEvent> {
    vec![raw(0.5, 1.0, 64, 90), raw(0.0, 2.0, 60, 100), raw(1.25, 1.5, 67, 72)]
}
