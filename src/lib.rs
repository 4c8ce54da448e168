pub mod api;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use config::Config;
use db::Store;
use domain::Source;
use state::SharedState;

/// Metarr - Unified Media Catalog Service
/// Aggregates movie, TV and anime metadata from multiple catalogs
#[derive(Parser)]
#[command(name = "metarr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as background daemon with scheduler and web API
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Run one import for a source (tvmaze, tmdb, jikan, anidb, anilist)
    #[command(alias = "s")]
    Sync {
        /// Source name
        source: String,
    },

    /// Request a pause for a running import
    Pause {
        /// Source name
        source: String,
    },

    /// Show import status for every source
    #[command(alias = "st")]
    Status,

    /// Run one rating backfill batch now
    Backfill,

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let mut log_level = config.general.log_level.clone();
    if config.general.suppress_connection_errors {
        log_level.push_str(",reqwest::retry=off,hyper_util=off");
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (layer, task) = tracing_loki::builder()
            .label("app", "metarr")?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => run_daemon(config, prometheus_handle).await,
        Commands::Sync { source } => cmd_sync(config, &source).await,
        Commands::Pause { source } => cmd_pause(config, &source).await,
        Commands::Status => cmd_status(config).await,
        Commands::Backfill => cmd_backfill(config).await,
        Commands::Init => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }
    }
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "Metarr v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let shared = Arc::new(SharedState::new(config.clone()).await?);
    let api_state = api::create_app_state(Arc::clone(&shared), prometheus_handle).await;

    let sync_manager = Arc::clone(&shared.sync_manager);
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = sync_manager.start().await {
            error!("Sync manager error: {}", e);
        }
    });

    let backfill_handle = Arc::clone(&shared.backfill).start();

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting Web API on port {}", port);

        let app = api::router(api_state).await;
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("Web Server running at http://0.0.0.0:{}", port);
            if let Err(e) = axum::serve(listener, app).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    shared.sync_manager.stop().await;
    scheduler_handle.abort();
    backfill_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("Daemon stopped");

    Ok(())
}

async fn cmd_sync(config: Config, source_name: &str) -> anyhow::Result<()> {
    let source: Source = source_name
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown source: {source_name}"))?;

    let shared = SharedState::new(config).await?;
    let Some(runner) = shared.runner(source) else {
        println!("Source '{source}' is not enabled. Check config.toml and credentials.");
        return Ok(());
    };

    println!("Running import for {source}...");
    let outcome = runner.start().await;

    if outcome.is_already_running() {
        println!("An import for {source} is already in progress.");
        return Ok(());
    }

    println!();
    println!("{:-<60}", "");
    println!("Import complete!");
    println!("  Imported: {}", outcome.imported);
    println!("  Updated:  {}", outcome.updated);
    if !outcome.errors.is_empty() {
        println!("  Errors:   {}", outcome.errors.len());
        for error in outcome.errors.iter().take(10) {
            println!("    - {error}");
        }
    }

    Ok(())
}

async fn cmd_pause(config: Config, source_name: &str) -> anyhow::Result<()> {
    let source: Source = source_name
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown source: {source_name}"))?;

    let store = Store::new(&config.general.database_path).await?;
    store.ensure_import_status(source.as_str()).await?;
    store.set_source_active(source.as_str(), false).await?;
    println!("✓ Pause requested for {source}");
    println!("A running import stops at its next checkpoint.");

    Ok(())
}

async fn cmd_status(config: Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    println!("Import Status");
    println!("{:-<70}", "");

    for source in Source::CATALOGS {
        let count = store.count_by_source(source).await?;
        let status = store.get_import_status(source.as_str()).await?;

        match status {
            Some(row) => {
                let state = if row.is_active { "● active" } else { "○ idle" };
                println!("{} {}: {} records", state, source, count);
                println!(
                    "  page {} | imported {} | last sync: {}",
                    row.current_page,
                    row.total_imported,
                    row.last_sync_at.as_deref().unwrap_or("never")
                );
                if let Some(progress) = row.phase2_progress.as_deref() {
                    println!("  {progress}");
                }
                if !row.errors.is_empty() {
                    println!("  {} recent errors", row.errors.len());
                }
            }
            None => println!("○ {source}: {count} records (never synced)"),
        }
        println!();
    }

    Ok(())
}

async fn cmd_backfill(config: Config) -> anyhow::Result<()> {
    let shared = SharedState::new(config).await?;

    println!("Running rating backfill batch...");
    let outcome = shared.backfill.process_batch().await?;

    println!();
    println!("{:-<60}", "");
    println!("Backfill complete!");
    println!("  Updated:   {}", outcome.updated);
    println!("  Skipped:   {}", outcome.skipped);
    println!("  Failed:    {}", outcome.failed);
    if outcome.exhausted {
        println!("  Daily OMDb quota is exhausted; remaining records wait for reset.");
    }

    Ok(())
}
