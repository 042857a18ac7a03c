//! I/O multiplexer between the child, the local terminal and the classifier.
//!
//! Child output and local keystrokes are read on their own threads and
//! delivered here as `LoopEvent`s. The loop waits on them with a short
//! timeout so the child's liveness is probed even when nothing is flowing.

use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::logging::escape_bytes;
use crate::pty::{PtyWriter, StateHandle};

/// Upper bound on one wait for input.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

const STDIN_CHUNK: usize = 1024;

#[derive(Debug)]
pub enum LoopEvent {
    /// Bytes read from the PTY master.
    ChildOutput(Vec<u8>),
    /// The child closed its side of the PTY.
    ChildEof,
    ChildReadError(io::Error),
    /// Bytes typed on the local terminal.
    LocalInput(Vec<u8>),
    /// Process-level interrupt or termination request.
    Interrupt,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ChildClosedOutput,
    ChildExited,
    ReadFailed,
    WriteFailed,
    Interrupted,
}

pub struct Multiplexer<O: Write> {
    state: StateHandle,
    pty: PtyWriter,
    local_out: O,
}

impl<O: Write> Multiplexer<O> {
    pub fn new(state: StateHandle, pty: PtyWriter, local_out: O) -> Self {
        Self {
            state,
            pty,
            local_out,
        }
    }

    /// Run until the child goes away, a forwarding write fails, or an
    /// interrupt arrives. `child_alive` must not block.
    pub fn run<F>(&mut self, events: &Receiver<LoopEvent>, mut child_alive: F) -> Termination
    where
        F: FnMut() -> bool,
    {
        loop {
            match events.recv_timeout(POLL_TIMEOUT) {
                Ok(event) => {
                    if let Some(end) = self.handle(event) {
                        return end;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Termination::ChildClosedOutput,
            }

            if !child_alive() {
                return Termination::ChildExited;
            }
        }
    }

    fn handle(&mut self, event: LoopEvent) -> Option<Termination> {
        match event {
            LoopEvent::ChildOutput(bytes) => {
                tracing::trace!(
                    target: "transcript",
                    direction = "out",
                    len = bytes.len(),
                    raw = %escape_bytes(&bytes),
                    text = ?String::from_utf8_lossy(&bytes),
                    "chunk"
                );
                self.state.ingest(&bytes);
                if let Err(e) = forward(&mut self.local_out, &bytes) {
                    tracing::warn!(error = %e, "failed to write child output to terminal");
                    return Some(Termination::WriteFailed);
                }
                None
            }
            LoopEvent::ChildEof => Some(Termination::ChildClosedOutput),
            LoopEvent::ChildReadError(e) => {
                // Linux reports EIO on the master once the child has exited
                tracing::debug!(error = %e, "read from child failed");
                Some(Termination::ReadFailed)
            }
            LoopEvent::LocalInput(bytes) => {
                tracing::trace!(
                    target: "transcript",
                    direction = "in",
                    len = bytes.len(),
                    raw = %escape_bytes(&bytes),
                    "chunk"
                );
                if let Err(e) = self.pty.write_all(&bytes) {
                    tracing::warn!(error = %e, "failed to forward input to child");
                    return Some(Termination::WriteFailed);
                }
                None
            }
            LoopEvent::Interrupt => Some(Termination::Interrupted),
        }
    }
}

fn forward<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}

/// Read the local terminal's input on a dedicated thread.
pub fn spawn_input_reader(events: Sender<LoopEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = [0u8; STDIN_CHUNK];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if events.send(LoopEvent::LocalInput(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "local input closed");
                    break;
                }
            }
        }
    })
}
