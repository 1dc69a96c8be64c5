use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod commands;
mod scan;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    commands::run_command(cli)
}
