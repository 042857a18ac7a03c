//! CLI argument parsing for the wrapper.

mod args;

pub use args::{parse_args, CliConfig, VERSION};
