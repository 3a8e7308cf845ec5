//! Command-line interface definitions using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mentepyme - offline cache for the MentePyme app
///
/// Pre-caches the app's static assets, keeps a single live cache
/// generation, and serves requests cache-first or network-first.
#[derive(Parser, Debug)]
#[command(name = "mentepyme")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "MENTEPYME_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the configured generation and activate it
    Install,

    /// Send one request through the active generation
    Fetch(FetchArgs),

    /// List cache generations
    Caches,

    /// List the entries stored in a cache
    Entries(EntriesArgs),

    /// Delete a cache generation
    Purge(PurgeArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL, or a path resolved against the configured origin
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the body to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print status line and headers to stderr
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the entries command
#[derive(Parser, Debug)]
pub struct EntriesArgs {
    /// Cache name (defaults to the configured generation)
    #[arg(long)]
    pub cache: Option<String>,
}

/// Arguments for the purge command
#[derive(Parser, Debug)]
pub struct PurgeArgs {
    /// Cache name to delete
    pub name: String,
}
