//! PTY (pseudo-terminal) handling for the supervised child.
//!
//! - `spawn`: child spawning on a PTY, liveness, termination, resize
//! - `state`: rolling output buffer and UI state classification
//! - `rules`: ordered pattern table used by the classifier
//! - `input`: exclusive PTY writer and command framing

mod input;
pub mod rules;
mod spawn;
mod state;

pub use input::{CommandDispatcher, PtyWriter};
pub use spawn::{
    initial_size, local_terminal_size, spawn_child, spawn_output_reader, ChildProcess,
    MasterHandle, PtySession,
};
pub use state::{OutputState, StateHandle, StateSnapshot};
