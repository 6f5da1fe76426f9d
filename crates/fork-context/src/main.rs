//! Render a parent conversation into bounded context for a forked session.
//!
//! Reads a JSON array of messages and prints the preamble plus the
//! `<inherited_context>` block that would be injected into the child.
//!
//! # Examples
//!
//! ```sh
//! # From a file, default budgets
//! fork-context --input history.json
//!
//! # From stdin, with a partial config override
//! cat history.json | fork-context --config fork.json
//!
//! # Inspect what the pipeline did
//! fork-context --input history.json --stats --verbose
//! ```

use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use fork_context::{ForkContextConfig, ForkPipeline, Message};
use tracing_subscriber::EnvFilter;

/// Render a parent conversation into bounded context for a forked session.
#[derive(Parser)]
#[command(name = "fork-context")]
struct Cli {
    /// JSON file with the message history. Reads stdin when omitted or `-`.
    #[arg(long)]
    input: Option<PathBuf>,

    /// JSON config file; fields it omits keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print processing statistics as JSON instead of the context.
    #[arg(long)]
    stats: bool,

    /// Print only the context block, without the preamble.
    #[arg(long)]
    no_preamble: bool,

    /// Log pipeline decisions to stderr.
    #[arg(long, short)]
    verbose: bool,
}

fn read_messages(input: Option<&PathBuf>) -> Result<Vec<Message>, String> {
    let raw = match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            buf
        }
    };
    serde_json::from_str(&raw).map_err(|e| format!("failed to parse messages: {e}"))
}

fn run(cli: &Cli) -> Result<String, String> {
    let config = match &cli.config {
        Some(path) => ForkContextConfig::load(path)?,
        None => ForkContextConfig::default(),
    };
    let pipeline = ForkPipeline::new(config)?;
    let messages = read_messages(cli.input.as_ref())?;

    let fork = pipeline.prepare(messages);
    if cli.stats {
        serde_json::to_string_pretty(&fork.stats)
            .map_err(|e| format!("failed to serialize stats: {e}"))
    } else if cli.no_preamble {
        Ok(fork.text)
    } else {
        Ok(fork.to_injection())
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
