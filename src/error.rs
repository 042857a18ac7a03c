//! Error type for the wrapper.
//!
//! Only failures that end the session are represented here. Dispatch,
//! resize and liveness failures are reported as booleans or swallowed.

use std::io;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{0}' command not found. Make sure it is installed and on PATH.")]
    ExecutableNotFound(String),

    #[error("PTY error: {0}")]
    Pty(String),

    #[error("failed to bind control surface on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
