//! Tracing setup and the optional diagnostic transcript.
//!
//! The local terminal carries the child's UI, so by default only warnings
//! reach stderr. With a debug file, every log line goes to the file instead
//! and the `transcript` target records each raw chunk and command.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Target used for raw I/O records.
pub const TRANSCRIPT_TARGET: &str = "transcript";

/// Where log output goes and how much of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink<'a> {
    Stderr { quiet: bool },
    DebugFile(&'a Path),
}

impl LogSink<'_> {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> String {
        match self {
            LogSink::Stderr { quiet: true } => "error".to_string(),
            LogSink::Stderr { quiet: false } => format!("warn,{TRANSCRIPT_TARGET}=off"),
            LogSink::DebugFile(_) => format!("debug,{TRANSCRIPT_TARGET}=trace"),
        }
    }
}

pub fn init_tracing(sink: LogSink<'_>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(sink.default_filter()));

    let builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = match sink {
        LogSink::Stderr { .. } => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())
        }
        LogSink::DebugFile(path) => {
            let file = File::create(path)
                .with_context(|| format!("could not open debug file {}", path.display()))?;
            tracing::subscriber::set_global_default(
                builder.with_ansi(false).with_writer(Mutex::new(file)).finish(),
            )
        }
    };
    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}

/// Escape raw bytes the way a byte-string literal would show them.
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}
