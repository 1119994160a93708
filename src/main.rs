// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging and hand off to
//   `cli::run`, whose outcome becomes the process exit code.

use clap::Parser;
use pyencrypt_client::cli::{self, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with command output.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("pyencrypt_client={}", log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    cli::run(cli).into()
}
