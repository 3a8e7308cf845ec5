//! mentepyme entry point.
//!
//! Drives the offline cache from the command line. Logging goes to stderr so
//! fetched bodies and JSON listings on stdout stay clean.

use anyhow::Result;
use clap::Parser;
use mentepyme_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::App;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = AppConfig::load_from(cli.config.as_deref())?;
    tracing::debug!(cache = %config.cache_name(), db = %config.db_path.display(), "configuration loaded");

    let app = App::open(config).await?;

    match cli.command {
        Commands::Install => commands::install(&app).await,
        Commands::Fetch(args) => commands::fetch(&app, args).await,
        Commands::Caches => commands::caches(&app).await,
        Commands::Entries(args) => commands::entries(&app, args).await,
        Commands::Purge(args) => commands::purge(&app, &args).await,
    }
}
