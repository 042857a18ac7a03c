//! Input forwarding to the PTY.
//!
//! Local keystrokes and control-surface commands share one writer; every
//! write goes through the `PtyWriter` lock so framed sequences never
//! interleave.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Pause between a line command and its carriage return. Prompt libraries
/// that poll their input treat command+CR in a single read as a paste.
pub const LINE_COMMAND_DELAY: Duration = Duration::from_millis(1);

const ESC: char = '\x1b';
const CR: &[u8] = b"\r";

/// Cloneable, exclusive handle on the PTY master's writer.
#[derive(Clone)]
pub struct PtyWriter {
    inner: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
}

impl PtyWriter {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(writer))),
        }
    }

    /// Write `data` and flush while holding the lock.
    pub fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.with_writer(|w| {
            w.write_all(data)?;
            w.flush()
        })
    }

    /// Run `f` with exclusive access to the writer.
    pub fn with_writer<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(writer) => f(&mut **writer),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "PTY writer closed")),
        }
    }

    /// Drop the writer; later writes fail with `NotConnected`.
    pub fn close(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Write + Send>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl PtyWriter {
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

/// How a logical command is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Escape sequence, written as-is.
    Raw,
    /// Empty command: a lone carriage return.
    Acknowledge,
    /// Text, then a short pause, then a carriage return.
    Line,
}

impl Framing {
    pub fn for_command(command: &str) -> Self {
        if command.starts_with(ESC) {
            Framing::Raw
        } else if command.is_empty() {
            Framing::Acknowledge
        } else {
            Framing::Line
        }
    }
}

/// Writes control-surface commands to the child.
#[derive(Clone)]
pub struct CommandDispatcher {
    writer: PtyWriter,
    line_delay: Duration,
}

impl CommandDispatcher {
    pub fn new(writer: PtyWriter) -> Self {
        Self {
            writer,
            line_delay: LINE_COMMAND_DELAY,
        }
    }

    /// Frame and write `command`. Returns false if the write failed; never retries.
    pub fn dispatch(&self, command: &str) -> bool {
        let framing = Framing::for_command(command);
        tracing::debug!(target: "transcript", command = ?command, framing = ?framing, "send command");

        let result = self.writer.with_writer(|w| match framing {
            Framing::Raw => write_framed(w, command.as_bytes(), "raw"),
            Framing::Acknowledge => write_framed(w, CR, "cr"),
            Framing::Line => {
                write_framed(w, command.as_bytes(), "line")?;
                thread::sleep(self.line_delay);
                write_framed(w, CR, "cr")
            }
        });

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, command = ?command, "failed to send command");
                false
            }
        }
    }
}

fn write_framed(w: &mut dyn Write, data: &[u8], part: &str) -> io::Result<()> {
    w.write_all(data)?;
    w.flush()?;
    tracing::trace!(target: "transcript", part, raw = ?String::from_utf8_lossy(data), "sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that records into a shared buffer, counting write calls.
    #[derive(Clone, Default)]
    struct Recorder {
        bytes: Arc<Mutex<Vec<u8>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.lock().unwrap().extend_from_slice(buf);
            *self.writes.lock().unwrap() += 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "child gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn recording_dispatcher() -> (CommandDispatcher, Recorder) {
        let recorder = Recorder::default();
        let writer = PtyWriter::new(Box::new(recorder.clone()));
        (CommandDispatcher::new(writer), recorder)
    }

    #[test]
    fn test_framing_for_command() {
        assert_eq!(Framing::for_command("\x1b[A"), Framing::Raw);
        assert_eq!(Framing::for_command(""), Framing::Acknowledge);
        assert_eq!(Framing::for_command("/help"), Framing::Line);
        assert_eq!(Framing::for_command("a\x1b"), Framing::Line);
    }

    #[test]
    fn test_dispatch_empty_writes_single_cr() {
        let (dispatcher, recorder) = recording_dispatcher();
        assert!(dispatcher.dispatch(""));
        assert_eq!(*recorder.bytes.lock().unwrap(), b"\r");
    }

    #[test]
    fn test_dispatch_escape_sequence_is_raw() {
        let (dispatcher, recorder) = recording_dispatcher();
        assert!(dispatcher.dispatch("\x1b[A"));
        assert_eq!(*recorder.bytes.lock().unwrap(), b"\x1b[A");
    }

    #[test]
    fn test_dispatch_line_command_appends_cr() {
        let (dispatcher, recorder) = recording_dispatcher();
        assert!(dispatcher.dispatch("help"));
        let bytes = recorder.bytes.lock().unwrap();
        assert_eq!(*bytes, b"help\r");
        assert_eq!(bytes.len(), "help".len() + 1);
        // Command and CR go out as separate writes
        assert_eq!(*recorder.writes.lock().unwrap(), 2);
    }

    #[test]
    fn test_dispatch_multibyte_line() {
        let (dispatcher, recorder) = recording_dispatcher();
        assert!(dispatcher.dispatch("héllo"));
        assert_eq!(*recorder.bytes.lock().unwrap(), "héllo\r".as_bytes());
    }

    #[test]
    fn test_dispatch_failure_returns_false() {
        let dispatcher = CommandDispatcher::new(PtyWriter::new(Box::new(Broken)));
        assert!(!dispatcher.dispatch("help"));
        assert!(!dispatcher.dispatch(""));
    }

    #[test]
    fn test_dispatch_after_close_returns_false() {
        let (dispatcher, recorder) = recording_dispatcher();
        dispatcher.writer.close();
        assert!(dispatcher.writer.is_closed());
        assert!(!dispatcher.dispatch("\x1b[B"));
        assert!(recorder.bytes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_dispatch_does_not_interleave() {
        let (dispatcher, recorder) = recording_dispatcher();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let d = dispatcher.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        d.dispatch(&format!("cmd{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let bytes = recorder.bytes.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let frames: Vec<&str> = text.split_terminator('\r').collect();
        assert_eq!(frames.len(), 40);
        assert!(frames.iter().all(|f| f.len() == 4 && f.starts_with("cmd")));
    }
}
