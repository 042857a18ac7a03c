//! Session wiring and shutdown.
//!
//! `run` spawns the child, starts the control surface and the signal
//! listeners, then drives the multiplexer on the calling thread. Whatever
//! ends the loop, `Session::cleanup` runs exactly once, in this order:
//! restore the local terminal, stop the control surface, close the PTY
//! master, terminate the child.

use std::io::{self, IsTerminal};
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use anyhow::Context;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::runtime::Handle;

use crate::cli::CliConfig;
use crate::logging::TRANSCRIPT_TARGET;
use crate::mux::{spawn_input_reader, LoopEvent, Multiplexer, Termination};
use crate::pty::{
    initial_size, spawn_child, spawn_output_reader, ChildProcess, CommandDispatcher,
    MasterHandle, OutputState, PtySession, PtyWriter, StateHandle,
};
use crate::server::{self, ControlServer};

/// How long in-flight control requests get to finish during shutdown.
const SERVER_DRAIN: Duration = Duration::from_secs(1);
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(200);

/// Resources torn down at the end of a session.
pub struct Session {
    raw_mode: bool,
    server: Option<ControlServer>,
    writer: PtyWriter,
    master: Option<MasterHandle>,
    child: Option<ChildProcess>,
    cleaned_up: bool,
}

impl Session {
    pub fn new(writer: PtyWriter, master: MasterHandle, child: ChildProcess) -> Self {
        Self {
            raw_mode: false,
            server: None,
            writer,
            master: Some(master),
            child: Some(child),
            cleaned_up: false,
        }
    }

    fn child_alive(&mut self) -> bool {
        self.child.as_mut().is_some_and(|child| child.is_alive())
    }

    /// Tear everything down. Safe to call more than once; a failing step
    /// does not stop the ones after it.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        tracing::debug!("cleaning up");

        if self.raw_mode {
            if let Err(e) = disable_raw_mode() {
                tracing::warn!(error = %e, "failed to restore terminal mode");
            }
            self.raw_mode = false;
        }

        if let Some(mut server) = self.server.take() {
            server.stop(SERVER_DRAIN);
        }

        if let Some(master) = self.master.take() {
            master.suppress_eof_on_close();
            self.writer.close();
            master.close();
        } else {
            self.writer.close();
        }

        if let Some(mut child) = self.child.take() {
            child.terminate();
        }

        tracing::info!(target: TRANSCRIPT_TARGET, "debug log ended");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Run one supervised session to completion.
pub fn run(config: &CliConfig) -> anyhow::Result<Termination> {
    let PtySession {
        child,
        master,
        writer,
        reader,
    } = spawn_child(&config.program, &config.child_args, initial_size())?;

    let mut session = Session::new(writer.clone(), master.clone(), child);
    let state = StateHandle::new(OutputState::new());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("claude-deck-rt")
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let app = server::router(state.clone(), CommandDispatcher::new(writer.clone()));
    match ControlServer::start(runtime.handle(), config.control_addr(), app) {
        Ok(server) => session.server = Some(server),
        Err(e) => tracing::warn!(error = %e, "continuing without control surface"),
    }

    session.raw_mode = enter_raw_mode();

    let (events_tx, events_rx) = mpsc::channel();
    spawn_output_reader(reader, events_tx.clone());
    spawn_input_reader(events_tx.clone());
    spawn_signal_listeners(runtime.handle(), master, events_tx);

    let mut mux = Multiplexer::new(state, writer, io::stdout());
    let end = mux.run(&events_rx, || session.child_alive());
    tracing::info!(reason = ?end, "session ended");

    session.cleanup();
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    Ok(end)
}

fn enter_raw_mode() -> bool {
    if !io::stdin().is_terminal() {
        return false;
    }
    match enable_raw_mode() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "could not set terminal to raw mode");
            false
        }
    }
}

/// Apply the geometry reported by `size` to the master. Best effort.
#[cfg(unix)]
fn handle_resize<F>(master: &MasterHandle, size: F) -> bool
where
    F: FnOnce() -> Option<portable_pty::PtySize>,
{
    match size() {
        Some(size) => master.resize(size),
        None => {
            tracing::debug!("terminal size unavailable, resize skipped");
            false
        }
    }
}

/// Resize propagation and interrupt delivery, both off the main loop.
///
/// Handlers are registered before this returns, so a signal raised
/// afterwards always reaches the loop.
#[cfg(unix)]
fn spawn_signal_listeners(runtime: &Handle, master: MasterHandle, events: Sender<LoopEvent>) {
    use crate::pty::local_terminal_size;
    use tokio::signal::unix::{signal, Signal, SignalKind};

    async fn recv(sig: &mut Option<Signal>) {
        match sig {
            Some(sig) => {
                sig.recv().await;
            }
            None => std::future::pending().await,
        }
    }

    let _guard = runtime.enter();
    let register = |kind: SignalKind, name: &str| match signal(kind) {
        Ok(sig) => Some(sig),
        Err(e) => {
            tracing::debug!(error = %e, signal = name, "failed to register signal handler");
            None
        }
    };
    let winch = register(SignalKind::window_change(), "SIGWINCH");
    let mut interrupt = register(SignalKind::interrupt(), "SIGINT");
    let mut term = register(SignalKind::terminate(), "SIGTERM");
    let mut hup = register(SignalKind::hangup(), "SIGHUP");

    if let Some(mut winch) = winch {
        runtime.spawn(async move {
            while winch.recv().await.is_some() {
                handle_resize(&master, local_terminal_size);
            }
        });
    }

    runtime.spawn(async move {
        tokio::select! {
            _ = recv(&mut interrupt) => {}
            _ = recv(&mut term) => {}
            _ = recv(&mut hup) => {}
        }
        tracing::info!("received interrupt signal");
        let _ = events.send(LoopEvent::Interrupt);
    });
}

#[cfg(not(unix))]
fn spawn_signal_listeners(runtime: &Handle, _master: MasterHandle, events: Sender<LoopEvent>) {
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt signal");
            let _ = events.send(LoopEvent::Interrupt);
        }
    });
}
