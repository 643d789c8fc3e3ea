use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// flb-bridge: load and exercise Fluent Bit output plugins built with flb-bridge-core
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the plugin and print what it reports
    Info {
        /// Path to the plugin shared object
        library: PathBuf,
    },
    /// Run the full lifecycle against records read from a JSON-lines file
    Run {
        /// Path to the plugin shared object
        library: PathBuf,
        /// JSON-lines file, one record object per line
        #[arg(short, long)]
        input: PathBuf,
        /// Settings file (.toml, .yaml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Plugin property, KEY=VALUE; overrides the settings file
        #[arg(short = 'p', long = "property", value_name = "KEY=VALUE")]
        properties: Vec<String>,
        /// Tag attached to every batch
        #[arg(short, long)]
        tag: Option<String>,
        /// Records per flush
        #[arg(long)]
        batch_size: Option<usize>,
        /// Redeliveries of a batch answered with RETRY before it is dropped
        #[arg(long)]
        max_retries: Option<u32>,
    },
}
