use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fbox",
    about = "fbox: content-addressed version control server",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print push entries (path, sha256, size, mode) for files and directories
    Hash(HashArgs),
    /// Print the effective server configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Listen address, overriding the configuration file
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct HashArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
