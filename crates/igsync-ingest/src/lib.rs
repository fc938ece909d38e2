//! igsync Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Paced ingestion of media, locations and comments from an external source
//! into checkpointed storage.
//!
//! # Components
//!
//! - **Limiter**: cross-process pacing through a locked state file
//! - **Source**: enumeration of identifiers still needing work
//! - **Extractors**: fetch and post-processing per record kind
//! - **Store**: atomic upserts with checkpoint stamps and locked reference updates
//! - **Pipeline**: the sequential loop tying them together
//!
//! # Example
//!
//! ```no_run
//! use igsync_ingest::client::{HttpSourceClient, SourceConfig};
//! use igsync_ingest::extractor::ExtractorKind;
//! use igsync_ingest::limiter::{PacingConfig, RateLimiter};
//! use igsync_ingest::pipeline::IngestionPipeline;
//! use igsync_ingest::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(HttpSourceClient::new(&SourceConfig::default())?);
//!     let extractor = ExtractorKind::TopMedias.build(
//!         client,
//!         &["台北美食".to_string()],
//!         &["food".to_string()],
//!     )?;
//!     let pipeline = IngestionPipeline::new(
//!         RateLimiter::new(PacingConfig::default()),
//!         Arc::new(MemoryStore::new()),
//!     );
//!     let stats = pipeline.run_extractor(extractor.as_ref()).await?;
//!     println!("{} succeeded", stats.succeeded);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod limiter;
pub mod pipeline;
pub mod records;
pub mod source;
pub mod store;

pub use error::{IngestError, Result};
