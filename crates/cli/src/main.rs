//! rstore - command-line client for pooled object storage

mod commands;
mod exit_code;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::Cli;

/// Default filter for the given `-v` count; `RUST_LOG` takes precedence
fn default_filter(verbose: u8, debug: bool) -> &'static str {
    match verbose {
        0 if debug => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.debug);

    commands::execute(cli).await.into()
}
