use std::path::Path;

use colored::Colorize;
use fbox_server::{FboxServer, ServerConfig};
use fbox_types::Entry;

use crate::cli::*;
use crate::scan;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Hash(args) => cmd_hash(args),
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => Ok(ServerConfig::load(path)?),
        None => Ok(ServerConfig::default()),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    println!("{} fbox on {}", "▶".green().bold(), config.bind_addr.to_string().bold());
    println!("  blobs:     {}", config.blob_root.display());
    println!("  metadata:  {}", config.meta_path.display());
    println!("  namespace: {}", config.namespace.cyan());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(FboxServer::new(config).serve())?;
    Ok(())
}

fn cmd_hash(args: HashArgs) -> anyhow::Result<()> {
    let entries = scan::scan(&args.paths)?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => print_entries(&entries),
    }
    Ok(())
}

fn print_entries(entries: &[Entry]) {
    let total: u64 = entries.iter().map(|e| e.size).sum();
    for entry in entries {
        println!(
            "{} {:04o} {:>10}  {}",
            entry.sha256.short_hex().yellow(),
            entry.mode,
            entry.size,
            entry.path
        );
    }
    println!(
        "{} {} files, {} bytes",
        "✓".green().bold(),
        entries.len().to_string().bold(),
        total
    );
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}
