//! Sequential ingestion loop
//!
//! Each identifier goes through: pacing lock, guarded fetch, lock release,
//! post-processing, one atomic upsert. Whatever goes wrong for one identifier
//! is logged and counted; the loop always moves on to the next one. Failed
//! identifiers keep an unset checkpoint, so the next run selects them again.

use crate::error::{IngestError, Result};
use crate::extractor::Extractor;
use crate::limiter::RateLimiter;
use crate::store::{CheckpointedStore, UpsertOutcome};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Pipeline statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    /// The source returned nothing for the identifier
    pub no_data: usize,
    /// Fetch, validation or persistence failed
    pub failed: usize,
    /// The pacing lock was held elsewhere
    pub skipped: usize,
    pub records_written: usize,
    pub references_marked: u64,
}

enum ItemOutcome {
    Stored(UpsertOutcome),
    NoData,
}

pub struct IngestionPipeline {
    limiter: RateLimiter,
    store: Arc<dyn CheckpointedStore>,
}

impl IngestionPipeline {
    pub fn new(limiter: RateLimiter, store: Arc<dyn CheckpointedStore>) -> Self {
        Self { limiter, store }
    }

    /// List the extractor's work source and run every identifier
    pub async fn run_extractor(&self, extractor: &dyn Extractor) -> Result<RunStats> {
        match extractor.work_source().list(self.store.as_ref()).await? {
            Some(items) => Ok(self.run(&items, extractor).await),
            None => {
                info!(extractor = extractor.name(), "Nothing to process");
                Ok(RunStats::default())
            },
        }
    }

    /// Process `items` one at a time, in order
    pub async fn run(&self, items: &[String], extractor: &dyn Extractor) -> RunStats {
        let name = extractor.name();
        let mut stats = RunStats {
            total: items.len(),
            ..RunStats::default()
        };
        info!(extractor = name, items = items.len(), "Starting ingestion run");

        for item in items {
            match self.process(item, extractor).await {
                Ok(ItemOutcome::Stored(outcome)) => {
                    stats.succeeded += 1;
                    stats.records_written += outcome.records_written;
                    stats.references_marked += outcome.references_marked;
                    info!(
                        extractor = name,
                        item = %item,
                        records = outcome.records_written,
                        references = outcome.references_marked,
                        "Stored item"
                    );
                },
                Ok(ItemOutcome::NoData) => {
                    stats.no_data += 1;
                    error!(extractor = name, item = %item, "Got no data");
                },
                Err(e @ IngestError::Acquisition { .. }) => {
                    stats.skipped += 1;
                    warn!(extractor = name, item = %item, error = %e, "Skipping item this run");
                },
                Err(e @ IngestError::Fetch { .. }) => {
                    // Already logged at the pacing boundary.
                    stats.failed += 1;
                    warn!(extractor = name, item = %item, error = %e, "Item left unchecked");
                },
                Err(e) => {
                    stats.failed += 1;
                    error!(extractor = name, item = %item, error = %e, "Item left unchecked");
                },
            }
        }

        info!(
            extractor = name,
            total = stats.total,
            succeeded = stats.succeeded,
            no_data = stats.no_data,
            failed = stats.failed,
            skipped = stats.skipped,
            records_written = stats.records_written,
            references_marked = stats.references_marked,
            "Ingestion run finished"
        );
        stats
    }

    async fn process(&self, item: &str, extractor: &dyn Extractor) -> Result<ItemOutcome> {
        let mut guard = self.limiter.acquire().await?;
        let fetched = guard.guarded_call(item, || extractor.fetch(item)).await;
        // Drop logs a failed final write; it never discards a fetched payload.
        drop(guard);

        let Some(raw) = fetched? else {
            return Ok(ItemOutcome::NoData);
        };

        let checked_at = self.limiter.clock().now_epoch_seconds();
        let request = extractor.prepare(item, raw, checked_at)?;
        let outcome = self.store.upsert(&request).await?;
        Ok(ItemOutcome::Stored(outcome))
    }
}
