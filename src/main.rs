//! Mason CLI entry point.
//!
//! Parses arguments, initializes logging, runs the selected command and
//! renders any error chain before exiting non-zero.

use anyhow::Result;
use clap::Parser;
use mason_cli::cli::Cli;
use mason_cli::core::display_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flags.
    if let Some(directive) = cli.log_directive() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directive));
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
