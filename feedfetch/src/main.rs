//! feedfetch - podcast catalog harvester
//!
//! Reads an identifier list, looks each identifier up in batches against
//! the iTunes lookup API and stores the results in a SQLite catalog.
//! Re-running against the same catalog only fetches what is still missing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use feedfetch::db::SqliteCatalogStore;
use feedfetch::models::RunReport;
use feedfetch::services::HttpTransport;
use feedfetch::HarvestError;
use feedfetch_common::config::{self, TomlConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for feedfetch
#[derive(Parser, Debug)]
#[command(name = "feedfetch")]
#[command(about = "Harvest podcast catalog metadata from the iTunes lookup API")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); falls back to $FEEDFETCH_CONFIG, then the per-user file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identifier list, one id or podcast URL per line
    #[arg(short, long, env = "FEEDFETCH_ID_FILE")]
    ids: Option<PathBuf>,

    /// Catalog database path
    #[arg(short, long, env = "FEEDFETCH_DATABASE")]
    database: Option<PathBuf>,

    /// Lookup requests per tick
    #[arg(long)]
    concurrent_fetches: Option<usize>,

    /// Identifiers per lookup request
    #[arg(long)]
    max_ids_per_fetch: Option<usize>,

    /// Buffered results that trigger a flush
    #[arg(long)]
    save_threshold: Option<usize>,

    /// Write the effective configuration to this file and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

impl Args {
    fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(ids) = &self.ids {
            config.input.id_list_file = ids.clone();
        }
        if let Some(database) = &self.database {
            config.persistence.database_path = database.clone();
        }
        if let Some(n) = self.concurrent_fetches {
            config.lookup.concurrent_fetches = n;
        }
        if let Some(n) = self.max_ids_per_fetch {
            config.lookup.max_ids_per_fetch = n;
        }
        if let Some(n) = self.save_threshold {
            config.persistence.save_threshold = n;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref());
    let mut config = config::load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;
    args.apply_overrides(&mut config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("feedfetch={}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting feedfetch {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    config.validate().context("Invalid configuration")?;

    if let Some(path) = &args.write_config {
        write_effective_config(&config, path)?;
        return Ok(());
    }

    let candidates = feedfetch::input::load_identifier_file(&config.input.id_list_file)
        .await
        .with_context(|| {
            format!(
                "Failed to read identifier list {}",
                config.input.id_list_file.display()
            )
        })?;

    let db_pool = feedfetch_common::db::init_database(&config.persistence.database_path)
        .await
        .context("Failed to open catalog database")?;
    info!("Database: {}", config.persistence.database_path.display());

    let transport = HttpTransport::new(Duration::from_secs(config.lookup.request_timeout_secs))
        .context("Failed to build HTTP client")?;
    let store = SqliteCatalogStore::new(db_pool);

    let outcome = feedfetch::harvest(
        &config,
        Arc::new(transport),
        Arc::new(store),
        candidates,
        shutdown_signal(),
    )
    .await;

    match outcome {
        Ok(report) => {
            log_report(&report);
            if let Some(path) = &config.logging.failed_ids_file {
                write_failed_ids(path, &report.failed_ids)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            Ok(())
        }
        Err(HarvestError::PersistenceExhausted { pending, source }) => {
            error!(
                unpersisted = pending.len(),
                ids = ?pending,
                "Catalog writes failed after every retry"
            );
            Err(HarvestError::PersistenceExhausted { pending, source }).context("Harvest aborted")
        }
        Err(e) => Err(e).context("Harvest failed"),
    }
}

fn log_report(report: &RunReport) {
    info!(
        seeded = report.seeded,
        responses = report.responses,
        buffered = report.results_buffered,
        rejected = report.results_rejected,
        persisted = report.rows_persisted,
        requeued = report.requeued,
        failed = report.failed_ids.len(),
        remaining = report.remaining,
        duration_secs = report.duration_seconds(),
        "Harvest complete"
    );
    if report.remaining > 0 {
        warn!(
            remaining = report.remaining,
            "Stopped before the pool was exhausted; re-run to fetch the rest"
        );
    }
}

/// Save the merged file, env and CLI configuration as TOML
fn write_effective_config(config: &TomlConfig, path: &Path) -> Result<()> {
    config::write_toml_config(config, path)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
    info!(path = %path.display(), "Wrote configuration");
    Ok(())
}

async fn write_failed_ids(path: &Path, ids: &[u64]) -> std::io::Result<()> {
    let mut contents = String::new();
    for id in ids {
        contents.push_str(&id.to_string());
        contents.push('\n');
    }
    tokio::fs::write(path, contents).await?;

    info!(path = %path.display(), count = ids.len(), "Wrote failed identifiers");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, draining");
        },
        _ = terminate => {
            info!("Received terminate signal, draining");
        },
    }
}
