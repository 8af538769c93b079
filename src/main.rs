mod auth;
mod cli;
mod commands;
mod config;
mod entry;
mod error;
mod local;
mod report;
mod store;
mod sync;
mod ui;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // Logs go to stderr so tables and CSV on stdout stay clean.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = commands::run(cli).await {
        ui::Printer::default().failure(&format!("{err:#}"));
        std::process::exit(1);
    }
}
