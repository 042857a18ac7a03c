use std::process::ExitCode;

mod app;
mod cli;
mod error;
mod logging;
mod models;
mod mux;
mod pty;
mod server;

use logging::{LogSink, TRANSCRIPT_TARGET};

fn main() -> ExitCode {
    let config = cli::parse_args();

    let sink = match config.debug_file.as_deref() {
        Some(path) => LogSink::DebugFile(path),
        None => LogSink::Stderr {
            quiet: config.quiet,
        },
    };
    if let Err(e) = logging::init_tracing(sink) {
        eprintln!("Warning: {e:#}");
        let _ = logging::init_tracing(LogSink::Stderr {
            quiet: config.quiet,
        });
    }
    tracing::info!(
        target: TRANSCRIPT_TARGET,
        program = %config.program,
        args = ?config.child_args,
        version = cli::VERSION,
        "debug log started"
    );

    if !config.quiet {
        print_banner(&config);
    }

    match app::run(&config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_banner(config: &cli::CliConfig) {
    println!("Claude Code + Stream Deck Wrapper");
    println!("{}", "=".repeat(50));
    if let Some(path) = &config.debug_file {
        println!("Debug mode enabled - writing terminal output to: {}", path.display());
    }
    if !config.child_args.is_empty() {
        println!("{} args: {}", config.program, config.child_args.join(" "));
    }
    println!("Control surface: http://{}", config.control_addr());
}
