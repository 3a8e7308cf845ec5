//! Subcommand implementations.
//!
//! Listings go to stdout as pretty JSON; diagnostics go through tracing on
//! stderr.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mentepyme_client::fetch::resolve;
use mentepyme_client::{Controller, FetchClient, FetchConfig, Transport, WorkerConfig};
use mentepyme_core::{AppConfig, CacheDb, GenerationState, Request, StoredEntry};
use serde::Serialize;

use crate::cli::{EntriesArgs, FetchArgs, PurgeArgs};

/// Loaded configuration plus the controller built from it.
pub struct App {
    config: AppConfig,
    controller: Controller,
}

impl App {
    pub async fn open(config: AppConfig) -> Result<Self> {
        let db = CacheDb::open(&config.db_path)
            .await
            .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
        let transport: Arc<dyn Transport> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
        Ok(Self { config, controller: Controller::new(db, transport) })
    }

    fn worker_config(&self) -> Result<WorkerConfig> {
        Ok(WorkerConfig::try_from(&self.config)?)
    }

    fn db(&self) -> &CacheDb {
        self.controller.db()
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{json}");
    Ok(())
}

#[derive(Debug, Serialize)]
struct InstallOutput {
    cache_name: String,
    installed: usize,
    deleted: Vec<String>,
}

/// Install and activate the configured generation.
pub async fn install(app: &App) -> Result<()> {
    let registration = app.controller.register(app.worker_config()?).await?;
    print_json(&InstallOutput {
        cache_name: registration.cache_name,
        installed: registration.installed,
        deleted: registration.deleted,
    })
}

/// Route one request through the active generation.
pub async fn fetch(app: &App, args: FetchArgs) -> Result<()> {
    let config = app.worker_config()?;
    let url = resolve(config.origin(), &args.url).with_context(|| format!("invalid request target {}", args.url))?;

    let configured = config.cache_name().to_string();
    match app.controller.resume_active(config).await? {
        Some(active) if active != configured => tracing::warn!(
            configured = %configured,
            active = %active,
            "configured generation is not active; serving from the last active one"
        ),
        Some(_) => {}
        None => tracing::warn!(
            cache = %configured,
            "no active generation; run `mentepyme install` first. Sending request straight to the network"
        ),
    }

    let request = Request::new(&args.method, url);
    let response = app.controller.fetch(&request).await?;

    if args.include {
        eprintln!("{} {}", response.status, response.status_text);
        for (name, value) in &response.headers {
            eprintln!("{name}: {value}");
        }
        eprintln!();
    }

    match args.output {
        Some(path) => tokio::fs::write(&path, &response.body)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&response.body)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct CacheRow {
    name: String,
    state: Option<GenerationState>,
    configured: bool,
    entries: u64,
    bytes: u64,
    created_at: String,
}

/// List cache generations with their lifecycle state.
pub async fn caches(app: &App) -> Result<()> {
    let configured = app.config.cache_name();
    let mut rows = Vec::new();
    for summary in app.db().cache_summaries().await? {
        let state = app.db().generation_state(&summary.name).await?;
        rows.push(CacheRow {
            configured: summary.name == configured,
            name: summary.name,
            state,
            entries: summary.entries,
            bytes: summary.bytes,
            created_at: summary.created_at,
        });
    }
    print_json(&rows)
}

#[derive(Debug, Serialize)]
struct EntriesOutput {
    cache_name: String,
    entries: Vec<StoredEntry>,
}

/// List the entries of one cache.
pub async fn entries(app: &App, args: EntriesArgs) -> Result<()> {
    let cache_name = args.cache.unwrap_or_else(|| app.config.cache_name());
    if !app.db().has_cache(&cache_name).await? {
        bail!("no cache named {cache_name}");
    }
    let entries = app.db().list_entries(&cache_name).await?;
    print_json(&EntriesOutput { cache_name, entries })
}

/// Delete one cache generation.
pub async fn purge(app: &App, args: &PurgeArgs) -> Result<()> {
    if !app.db().delete_cache(&args.name).await? {
        bail!("no cache named {}", args.name);
    }

    if let Some(state) = app.db().generation_state(&args.name).await? {
        if state == GenerationState::Active {
            tracing::warn!(cache = %args.name, "purged the active generation; requests now go to the network");
        }
        app.db()
            .set_generation_state(&args.name, GenerationState::Redundant)
            .await?;
    }

    tracing::info!(cache = %args.name, "cache deleted");
    Ok(())
}
