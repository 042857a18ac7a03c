//! Child process spawning and lifecycle on a PTY.

use std::io::{self, Read};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};

use super::PtyWriter;
use crate::error::{Error, Result};
use crate::mux::LoopEvent;

/// Time the child gets to exit after the graceful signal.
pub const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Bound on waiting for the child to be reaped after the forced kill.
const REAP_TIMEOUT: Duration = Duration::from_millis(200);
const EXIT_POLL: Duration = Duration::from_millis(20);

/// Read size for child output.
pub const READ_CHUNK: usize = 1024;

const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLS: u16 = 80;

/// Everything produced by spawning the child.
pub struct PtySession {
    pub child: ChildProcess,
    pub master: MasterHandle,
    pub writer: PtyWriter,
    pub reader: Box<dyn Read + Send>,
}

/// Spawn `program` with `args` on a new PTY of the given size.
///
/// Fails with `ExecutableNotFound` if `program` is not on PATH.
pub fn spawn_child(program: &str, args: &[String], size: PtySize) -> Result<PtySession> {
    which::which(program).map_err(|_| Error::ExecutableNotFound(program.to_string()))?;

    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(size)
        .map_err(|e| Error::Pty(e.to_string()))?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(&cwd);
    }
    // Full UI rendering in the child
    cmd.env("TERM", "xterm-256color");

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| Error::Pty(e.to_string()))?;

    // Drop slave after spawning so EOF reaches us when the child exits
    drop(pair.slave);

    // Clone reader before take_writer
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| Error::Pty(e.to_string()))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| Error::Pty(e.to_string()))?;

    let child = ChildProcess::new(child);
    tracing::info!(program, pid = ?child.pid(), rows = size.rows, cols = size.cols, "child started");

    Ok(PtySession {
        child,
        master: MasterHandle::new(pair.master),
        writer: PtyWriter::new(writer),
        reader,
    })
}

/// Forward child output to the multiplexer from a dedicated thread.
pub fn spawn_output_reader(
    mut reader: Box<dyn Read + Send>,
    events: Sender<LoopEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let event = match reader.read(&mut buf) {
                Ok(0) => LoopEvent::ChildEof,
                Ok(n) => LoopEvent::ChildOutput(buf[..n].to_vec()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => LoopEvent::ChildReadError(e),
            };
            let done = !matches!(event, LoopEvent::ChildOutput(_));
            if events.send(event).is_err() || done {
                break;
            }
        }
    })
}

/// The supervised child. Owned by the session and terminated during cleanup.
pub struct ChildProcess {
    child: Box<dyn portable_pty::Child + Send + Sync>,
    pid: Option<u32>,
    exited: bool,
}

impl ChildProcess {
    pub fn new(child: Box<dyn portable_pty::Child + Send + Sync>) -> Self {
        let pid = child.process_id();
        Self {
            child,
            pid,
            exited: false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking liveness probe. Probe errors count as alive.
    pub fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::info!(pid = ?self.pid, code = status.exit_code(), "child exited");
                self.exited = true;
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::debug!(error = %e, "liveness probe failed");
                true
            }
        }
    }

    /// Graceful signal, bounded grace period, then forced kill.
    ///
    /// A child that is already gone counts as terminated.
    pub fn terminate(&mut self) {
        if !self.is_alive() {
            return;
        }

        if self.signal_graceful() && self.wait_for_exit(TERMINATE_GRACE) {
            return;
        }

        tracing::debug!(pid = ?self.pid, "child still running after grace period, killing");
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "kill failed");
        }
        self.wait_for_exit(REAP_TIMEOUT);
    }

    #[cfg(unix)]
    fn signal_graceful(&mut self) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return false;
        };
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => true,
            Err(Errno::ESRCH) => {
                self.exited = true;
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "SIGTERM failed");
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_graceful(&mut self) -> bool {
        false
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_alive() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL);
        }
    }
}

/// Shared handle on the PTY master, used for resizes and closed during cleanup.
#[derive(Clone)]
pub struct MasterHandle {
    inner: Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>,
}

impl MasterHandle {
    pub fn new(master: Box<dyn MasterPty + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(master))),
        }
    }

    /// Apply `size` to the master. Best effort: returns false on failure.
    pub fn resize(&self, size: PtySize) -> bool {
        let guard = self.lock();
        let Some(master) = guard.as_ref() else {
            return false;
        };
        match master.resize(size) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "PTY resize failed");
                false
            }
        }
    }

    /// Clear the line discipline's EOF character.
    ///
    /// portable-pty's writer sends a newline and VEOF to the child when it is
    /// dropped, unless VEOF is unset. Call this before closing the writer so
    /// shutdown injects no input.
    #[cfg(unix)]
    pub fn suppress_eof_on_close(&self) -> bool {
        use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, SpecialCharacterIndices};
        use std::os::fd::BorrowedFd;

        let guard = self.lock();
        let Some(raw) = guard.as_ref().and_then(|master| master.as_raw_fd()) else {
            return false;
        };
        // SAFETY: the fd belongs to the master held by `guard` and stays open
        // until the guard is released.
        let fd = unsafe { BorrowedFd::borrow_raw(raw) };
        let result = tcgetattr(fd).and_then(|mut termios| {
            termios.control_chars[SpecialCharacterIndices::VEOF as usize] = 0;
            tcsetattr(fd, SetArg::TCSANOW, &termios)
        });
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "failed to clear VEOF on PTY");
                false
            }
        }
    }

    #[cfg(not(unix))]
    pub fn suppress_eof_on_close(&self) -> bool {
        false
    }

    pub fn close(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn MasterPty + Send>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl MasterHandle {
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    pub fn size(&self) -> Option<PtySize> {
        self.lock().as_ref().and_then(|master| master.get_size().ok())
    }
}

/// Geometry of the controlling terminal, if there is one.
pub fn local_terminal_size() -> Option<PtySize> {
    let (cols, rows) = crossterm::terminal::size().ok()?;
    if cols == 0 || rows == 0 {
        return None;
    }
    Some(pty_size(rows, cols))
}

/// Initial PTY size: the local terminal's, or 24x80.
pub fn initial_size() -> PtySize {
    local_terminal_size().unwrap_or_else(|| pty_size(DEFAULT_ROWS, DEFAULT_COLS))
}

fn pty_size(rows: u16, cols: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn spawn(program: &str, args: &[&str]) -> PtySession {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        spawn_child(program, &args, pty_size(DEFAULT_ROWS, DEFAULT_COLS)).expect("spawn")
    }

    #[test]
    fn test_missing_executable_is_fatal_error() {
        let result = spawn_child("definitely-not-a-real-binary-7f3a", &[], initial_size());
        assert!(matches!(result, Err(Error::ExecutableNotFound(name)) if name == "definitely-not-a-real-binary-7f3a"));
    }

    #[test]
    fn test_terminate_running_child() {
        let mut session = spawn("sleep", &["30"]);
        assert!(session.child.is_alive());

        let started = Instant::now();
        session.child.terminate();
        assert!(!session.child.is_alive());
        assert!(started.elapsed() < Duration::from_secs(2));

        // Already gone: no error, no wait
        session.child.terminate();
        assert!(!session.child.is_alive());
    }

    #[test]
    fn test_reader_reports_output_then_end() {
        let session = spawn("echo", &["hello-from-child"]);
        let (tx, rx) = mpsc::channel();
        let handle = spawn_output_reader(session.reader, tx);
        drop(session.writer);

        let mut output = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_secs(5)).expect("reader event") {
                LoopEvent::ChildOutput(bytes) => output.extend(bytes),
                LoopEvent::ChildEof | LoopEvent::ChildReadError(_) => break,
                _ => unreachable!(),
            }
        }
        handle.join().unwrap();
        assert!(String::from_utf8_lossy(&output).contains("hello-from-child"));
    }

    fn collect_output(rx: &mpsc::Receiver<LoopEvent>, window: Duration) -> String {
        let deadline = Instant::now() + window;
        let mut output = Vec::new();
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(LoopEvent::ChildOutput(bytes)) => output.extend(bytes),
                Ok(_) | Err(_) => break,
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn test_closing_writer_sends_no_input_to_child() {
        let session = spawn("sh", &["-c", "read x; echo GOT-LINE-[$x]"]);
        let (tx, rx) = mpsc::channel();
        spawn_output_reader(session.reader, tx);
        let mut child = session.child;

        assert!(session.master.suppress_eof_on_close());
        session.writer.close();

        let output = collect_output(&rx, Duration::from_millis(500));
        assert!(!output.contains("GOT-LINE"), "child read injected input: {output:?}");
        assert!(child.is_alive());

        child.terminate();
        session.master.close();
    }

    #[test]
    fn test_suppress_eof_after_close_is_noop() {
        let mut session = spawn("sleep", &["30"]);
        session.master.close();
        assert!(!session.master.suppress_eof_on_close());
        session.child.terminate();
    }

    #[test]
    fn test_master_resize_and_close() {
        let mut session = spawn("sleep", &["30"]);
        assert!(session.master.resize(pty_size(40, 120)));
        session.master.close();
        assert!(session.master.is_closed());
        assert!(!session.master.resize(pty_size(40, 120)));
        session.child.terminate();
    }
}
