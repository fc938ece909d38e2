//! Error types for ingestion
//!
//! Every per-item failure maps to one of these variants and is contained
//! within a single pipeline iteration. Only `Config`, `Database` and `Io`
//! raised during startup are allowed to end a run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Another process holds the pacing lock past the bounded wait
    #[error("Pacing lock {} not acquired within {timeout_ms}ms", path.display())]
    Acquisition { path: PathBuf, timeout_ms: u64 },

    /// The pacing state file does not hold two non-negative integers
    #[error("Corrupt pacing state in {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// The external source failed for one identifier
    #[error("Fetch failed for {item}: {message}")]
    Fetch { item: String, message: String },

    /// A fetched payload or upsert request does not fit its table schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// A storage transaction failed and was rolled back
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Wrap an opaque fetch failure, keeping its full context chain
    pub fn fetch(item: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Fetch {
            item: item.into(),
            message: format!("{:#}", err),
        }
    }
}
