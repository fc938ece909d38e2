//! Ingestion configuration
//!
//! Everything is read from the environment (after loading `.env` when present)
//! and validated before the first request is made.

use crate::client::SourceConfig;
use crate::limiter::PacingConfig;
use crate::store::DatabaseConfig;
use igsync_common::env;
use serde::{Deserialize, Serialize};

/// Tags searched by the top-medias extractor when `INGEST_SEARCH_TAGS` is unset.
pub const DEFAULT_SEARCH_TAGS: &[&str] = &["台北美食"];

/// Words that mark a generated image description as food related.
pub const DEFAULT_FOOD_KEYWORDS: &[&str] = &["food", "drink", "dessert"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    pub pacing: PacingConfig,
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub search_tags: Vec<String>,
    pub food_keywords: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            database: DatabaseConfig::default(),
            source: SourceConfig::default(),
            search_tags: DEFAULT_SEARCH_TAGS.iter().map(|s| s.to_string()).collect(),
            food_keywords: DEFAULT_FOOD_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            pacing: PacingConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            source: SourceConfig::from_env()?,
            search_tags: env::list_or("INGEST_SEARCH_TAGS", DEFAULT_SEARCH_TAGS),
            food_keywords: env::list_or("INGEST_FOOD_KEYWORDS", DEFAULT_FOOD_KEYWORDS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pacing.validate()?;
        self.database.validate()?;
        self.source.validate()?;

        if self.search_tags.is_empty() {
            anyhow::bail!("INGEST_SEARCH_TAGS cannot be empty");
        }
        if self.food_keywords.is_empty() {
            anyhow::bail!("INGEST_FOOD_KEYWORDS cannot be empty");
        }
        Ok(())
    }
}
