// ABOUTME: Entry point for the stackup CLI application.
// ABOUTME: Parses arguments, installs logging and maps the launch outcome to an exit code.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use stackup::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));
    output.start_timer();

    match commands::launch(&cli, &output).await {
        Ok(report) => {
            output.report(&report);
            std::process::exit(report.exit_code());
        }
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}
