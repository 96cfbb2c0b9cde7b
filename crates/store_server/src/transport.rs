//! Snapshot transports: JSON lines over a TCP stream or stdout, plus the
//! reader task that turns inbound JSON lines into session commands.
//!
//! The transport owns no engine state. Commands flow through the bounded
//! session channel; when the peer disappears, the sink starts failing and
//! the session treats that as a stop.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::SyncSender;

use store_core::error::SinkError;
use store_core::session::{parse_command, Command, SnapshotSink};
use store_core::snapshot::TickSnapshot;

/// Newline-delimited JSON over any writer (TCP stream, stdout, a file).
pub struct JsonLinesSink<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl<W: Write> SnapshotSink for JsonLinesSink<W> {
    fn emit(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError> {
        let line = serde_json::to_string(snapshot)
            .map_err(|e| SinkError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Read newline-delimited command JSON from the peer and feed the session
/// channel. Runs on its own thread; returns when the peer hangs up or the
/// session is gone. Unknown commands are ignored.
pub fn read_commands<R: Read>(reader: R, sender: SyncSender<Command>) {
    let reader = BufReader::new(reader);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_command(trimmed) {
            Some(command) => {
                if sender.send(command).is_err() {
                    break;
                }
            }
            None => tracing::warn!(raw = trimmed, "ignoring unknown command"),
        }
    }
    // the peer closing its read side also stops the session
    let _ = sender.send(Command::Stop);
}

/// Spawn the command reader for a TCP peer.
pub fn spawn_tcp_reader(stream: TcpStream, sender: SyncSender<Command>) {
    std::thread::spawn(move || read_commands(stream, sender));
}
