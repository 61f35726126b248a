//! jbridge command-line tool
//!
//! Inspect type encodings, print the effective bridge configuration, and run
//! a proxy end to end against the in-process reference runtime.

mod commands;
mod logger;

use clap::{ArgAction, Parser, Subcommand};
use jbridge_core::BridgeConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jbridge")]
#[command(about = "Native proxies for managed-runtime objects", long_about = None)]
#[command(version)]
struct Cli {
    /// Bridge configuration file (jbridge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a type encoding or method signature
    Decode {
        /// Encoding, e.g. "i@:ii" or "{CGPoint=dd}"
        encoding: String,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Forward a few selectors to a peer in the reference runtime
    Demo {
        /// Repeat each call this many times
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BridgeConfig> {
    match path {
        Some(path) => Ok(BridgeConfig::load(path)?),
        None => Ok(BridgeConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Commands::Decode { encoding } => commands::decode::execute(&encoding),
        Commands::Config => commands::config::execute(&load_config(cli.config.as_ref())?),
        Commands::Demo { repeat } => commands::demo::execute(load_config(cli.config.as_ref())?, repeat),
    }
}
