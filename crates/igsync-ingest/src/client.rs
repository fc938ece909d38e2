//! Client for the external media source
//!
//! The source is reached through an HTTP gateway returning JSON. A 404 means
//! the source has nothing for the identifier and maps to `Ok(None)`; every
//! other failure is an error the pacing layer logs and reports per item.

use anyhow::{Context, Result};
use async_trait::async_trait;
use igsync_common::env;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Source Client Constants
// ============================================================================

/// Default gateway URL when `SOURCE_BASE_URL` is not set.
pub const DEFAULT_SOURCE_BASE_URL: &str = "http://localhost:8080";

/// Default timeout for a single source request in seconds.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
        }
    }
}

impl SourceConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            base_url: env::string_or("SOURCE_BASE_URL", DEFAULT_SOURCE_BASE_URL),
            timeout_secs: env::parse_or("SOURCE_TIMEOUT_SECS", DEFAULT_SOURCE_TIMEOUT_SECS),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("SOURCE_BASE_URL is not a valid URL: {}", self.base_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("SOURCE_BASE_URL cannot be used as a base URL: {}", self.base_url);
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("SOURCE_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }
}

/// Fetch capability of the external source
///
/// Payloads are returned raw; shaping them into records is the extractors' job.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Current top medias of a tag, as a JSON array
    async fn top_medias_by_tag(&self, tag: &str) -> Result<Option<Value>>;

    async fn media_by_code(&self, short_code: &str) -> Result<Option<Value>>;

    /// Comments of a media, as a JSON array
    async fn comments_by_code(&self, short_code: &str) -> Result<Option<Value>>;

    async fn location_by_id(&self, location_id: &str) -> Result<Option<Value>>;
}

pub struct HttpSourceClient {
    client: Client,
    base_url: Url,
}

impl HttpSourceClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self { client, base_url })
    }

    /// Append percent-encoded path segments to the base URL
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("{} cannot be a base URL", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Option<Value>> {
        let url = self.url(segments)?;
        debug!(url = %url, "Requesting source");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .error_for_status()
            .with_context(|| format!("Source rejected {}", url))?
            .json::<Value>()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))?;

        Ok(if body.is_null() { None } else { Some(body) })
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn top_medias_by_tag(&self, tag: &str) -> Result<Option<Value>> {
        self.get_json(&["tags", tag, "top-medias"]).await
    }

    async fn media_by_code(&self, short_code: &str) -> Result<Option<Value>> {
        self.get_json(&["medias", short_code]).await
    }

    async fn comments_by_code(&self, short_code: &str) -> Result<Option<Value>> {
        self.get_json(&["medias", short_code, "comments"]).await
    }

    async fn location_by_id(&self, location_id: &str) -> Result<Option<Value>> {
        self.get_json(&["locations", location_id]).await
    }
}

/// Source that never has anything, for unit tests of payload shaping
#[cfg(test)]
pub(crate) struct OfflineSource;

#[cfg(test)]
#[async_trait]
impl SourceClient for OfflineSource {
    async fn top_medias_by_tag(&self, _: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn media_by_code(&self, _: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn comments_by_code(&self, _: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn location_by_id(&self, _: &str) -> Result<Option<Value>> {
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> HttpSourceClient {
        HttpSourceClient::new(&SourceConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_url_encodes_segments() {
        let url = client("http://gateway.local/api/").url(&["tags", "台北美食", "top-medias"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://gateway.local/api/tags/%E5%8F%B0%E5%8C%97%E7%BE%8E%E9%A3%9F/top-medias"
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(SourceConfig::default().validate().is_ok());
        let bad = SourceConfig {
            base_url: "not a url".into(),
            ..SourceConfig::default()
        };
        assert!(bad.validate().is_err());
        let zero = SourceConfig {
            timeout_secs: 0,
            ..SourceConfig::default()
        };
        assert!(zero.validate().is_err());
    }
}
