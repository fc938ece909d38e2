//! igsync Ingest - paced ingestion from the external media source

use anyhow::{Context, Result};
use clap::Parser;
use igsync_common::logging::{init_logging, LogConfig, LogLevel};
use igsync_ingest::client::HttpSourceClient;
use igsync_ingest::config::IngestConfig;
use igsync_ingest::extractor::ExtractorKind;
use igsync_ingest::limiter::RateLimiter;
use igsync_ingest::pipeline::IngestionPipeline;
use igsync_ingest::store::{CheckpointedStore, MemoryStore, PgStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "igsync-ingest")]
#[command(author, version, about = "Paced media ingestion")]
struct Cli {
    /// Extractor to run
    #[arg(value_enum)]
    extractor: ExtractorKind,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Write to an in-memory store instead of the database
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("igsync-ingest")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = IngestConfig::from_env().context("Invalid configuration")?;

    let store: Arc<dyn CheckpointedStore> = if cli.dry_run {
        warn!("Dry run: results are kept in memory and discarded on exit");
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        store.migrate().await?;
        Arc::new(store)
    };

    let client = Arc::new(HttpSourceClient::new(&config.source)?);
    let extractor = cli
        .extractor
        .build(client, &config.search_tags, &config.food_keywords)?;

    let pipeline = IngestionPipeline::new(RateLimiter::new(config.pacing.clone()), store);

    info!(extractor = %cli.extractor, "Running extractor");
    let stats = pipeline.run_extractor(extractor.as_ref()).await?;

    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        "Ingestion complete"
    );
    Ok(())
}
