//! CLI argument parsing and configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run Claude Code on a PTY and expose its UI state to a macro pad over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(name = "claude-deck", version)]
pub struct CliConfig {
    /// HTTP port for the control surface
    #[arg(long, env = "CLAUDE_DECK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address the control surface binds to
    #[arg(long, env = "CLAUDE_DECK_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Program to run on the PTY
    #[arg(long, env = "CLAUDE_DECK_PROGRAM", default_value = "claude")]
    pub program: String,

    /// Suppress the startup banner and most diagnostics
    #[arg(short, long)]
    pub quiet: bool,

    /// Write a timestamped transcript of all terminal I/O to this file
    #[arg(long, value_name = "PATH")]
    pub debug_file: Option<PathBuf>,

    /// Arguments passed to the program (e.g. --continue, --resume)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub child_args: Vec<String>,
}

impl CliConfig {
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Parse CLI arguments; exits with usage on error or `--help`.
pub fn parse_args() -> CliConfig {
    CliConfig::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(std::iter::once("claude-deck").chain(args.iter().copied()))
            .expect("valid args")
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.program, "claude");
        assert!(!config.quiet);
        assert!(config.debug_file.is_none());
        assert!(config.child_args.is_empty());
        assert_eq!(config.control_addr(), "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn test_options() {
        let config = parse(&["--port", "9000", "--quiet", "--debug-file", "/tmp/deck.log"]);
        assert_eq!(config.port, 9000);
        assert!(config.quiet);
        assert_eq!(config.debug_file, Some(PathBuf::from("/tmp/deck.log")));
    }

    #[test]
    fn test_child_args_pass_through() {
        let config = parse(&["--port", "8081", "--continue", "--model", "opus"]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.child_args, vec!["--continue", "--model", "opus"]);
    }

    #[test]
    fn test_child_args_after_separator() {
        let config = parse(&["--", "--port", "1"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.child_args, vec!["--port", "1"]);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = CliConfig::try_parse_from(["claude-deck", "--port", "99999"]);
        assert!(result.is_err());
    }
}
