//! IPC bridge: stdin reader and stdout event emitter.
//!
//! A blocking stdin reader thread sends deserialized commands through an
//! mpsc channel; events go out as JSON lines on stdout.

use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{ClapperCommand, ClapperEvent};

/// Emit a `ClapperEvent` as a JSON line on stdout and flush.
pub fn emit_event(event: &ClapperEvent) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_event(&mut handle, event);
}

/// Convenience helper for emitting error events.
pub fn emit_error(message: &str) {
    emit_event(&ClapperEvent::Error {
        message: message.to_string(),
    });
}

fn write_event<W: Write>(out: &mut W, event: &ClapperEvent) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            return;
        }
    };
    // Pipe may be closed.
    let _ = writeln!(out, "{}", json);
    let _ = out.flush();
}

fn parse_command(line: &str) -> Option<Result<ClapperCommand, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

/// Spawn a blocking thread that reads JSON lines from stdin, deserializes
/// them into `ClapperCommand`, and forwards them through the returned channel.
///
/// The channel closes when stdin does (detached or parent gone).
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<ClapperCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(text) => match parse_command(&text) {
                    None => continue,
                    Some(Ok(cmd)) => {
                        debug!(?cmd, "Received command");
                        if tx.send(cmd).is_err() {
                            break; // Main task is gone.
                        }
                    }
                    Some(Err(e)) => {
                        error!("Invalid JSON command: {} (input: {})", e, text.trim());
                        emit_error(&format!("Invalid JSON command: {}", e));
                    }
                },
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reader thread exiting");
    });

    rx
}
