//! igsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the igsync workspace members:
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Environment**: typed lookups used by every `from_env` constructor
//!
//! # Example
//!
//! ```no_run
//! use igsync_common::env;
//! use igsync_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let tags = env::list_or("INGEST_SEARCH_TAGS", &["coffee"]);
//!     tracing::info!(count = tags.len(), "Loaded search tags");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
