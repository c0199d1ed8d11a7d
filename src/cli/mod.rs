use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `linkrelay` - watches a Matrix room and posts summaries of shared links.
#[derive(Parser, Debug)]
#[command(name = "linkrelay")]
#[command(version)]
#[command(about = "Summarize links shared in a Matrix room into a forwarding room.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.linkrelay/config.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen to the monitored room and relay link summaries
    Run,

    /// Fetch and summarize a single URL
    Summarize {
        url: String,

        /// Also post the summary to the forwarding room
        #[arg(long)]
        post: bool,
    },

    /// Print the links that would be picked up from a message
    Extract { text: String },

    /// Print the effective configuration with secrets masked
    Config,
}
