//! Galley CLI: declarative recipe runner.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "galley",
    version,
    about = "Declarative recipe runner: YAML steps, pluggable agent adapters, BLAKE3 drift manifests"
)]
struct Cli {
    /// Engine config file (default: ./galley.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity: -v info, -vv debug (overrides GALLEY_LOG/RUST_LOG)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: galley::cli::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("GALLEY_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = galley::cli::dispatch(cli.command, cli.config.as_deref()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
