//! Extractor variants
//!
//! An [`Extractor`] pairs a fetch against the external source with the
//! post-processing and checkpoint rules for one kind of record. Variants are
//! chosen at startup through [`ExtractorKind`].
//!
//! | Kind | Work source | Writes | Checkpoint |
//! |------|-------------|--------|------------|
//! | `top-medias` | search tags | `top_medias` filtered to food | `tag` stamp |
//! | `media` | unchecked `short_code` | `top_medias` | `media_checked_time` |
//! | `location` | unchecked `location_id`, deduplicated | `location` | `top_medias.location_checked_time` |
//! | `comments` | unchecked `short_code` | `comment` | `top_medias.comments_checked_time` |

mod comments;
mod location;
mod media;
mod top_medias;

pub use comments::CommentsExtractor;
pub use location::LocationExtractor;
pub use media::MediaExtractor;
pub use top_medias::{food_filter, TopMediasExtractor};

use crate::client::SourceClient;
use crate::error::{IngestError, Result};
use crate::source::WorkSource;
use crate::store::UpsertRequest;
use async_trait::async_trait;
use clap::ValueEnum;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Where this extractor's identifiers come from
    fn work_source(&self) -> WorkSource;

    /// Fetch the raw payload for one identifier; `None` when the source has nothing
    async fn fetch(&self, id: &str) -> anyhow::Result<Option<serde_json::Value>>;

    /// Shape a raw payload into one atomic upsert, stamped with `checked_at`
    fn prepare(&self, id: &str, raw: serde_json::Value, checked_at: i64) -> Result<UpsertRequest>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractorKind {
    TopMedias,
    Media,
    Location,
    Comments,
}

impl ExtractorKind {
    pub fn build(
        self,
        client: Arc<dyn SourceClient>,
        search_tags: &[String],
        food_keywords: &[String],
    ) -> Result<Box<dyn Extractor>> {
        Ok(match self {
            ExtractorKind::TopMedias => Box::new(TopMediasExtractor::new(
                client,
                search_tags.to_vec(),
                food_keywords,
            )?),
            ExtractorKind::Media => Box::new(MediaExtractor::new(client)),
            ExtractorKind::Location => Box::new(LocationExtractor::new(client)),
            ExtractorKind::Comments => Box::new(CommentsExtractor::new(client)),
        })
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractorKind::TopMedias => "top-medias",
            ExtractorKind::Media => "media",
            ExtractorKind::Location => "location",
            ExtractorKind::Comments => "comments",
        };
        write!(f, "{}", name)
    }
}

/// Identifiers arrive as strings or numbers depending on the endpoint
pub(crate) fn identifier_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn expect_object(raw: Value, what: &str) -> Result<Map<String, Value>> {
    match raw {
        Value::Object(map) => Ok(map),
        other => Err(IngestError::validation(format!(
            "{} payload must be an object, got {}",
            what,
            json_kind(&other)
        ))),
    }
}

pub(crate) fn expect_array(raw: Value, what: &str) -> Result<Vec<Value>> {
    match raw {
        Value::Array(items) => Ok(items),
        other => Err(IngestError::validation(format!(
            "{} payload must be an array, got {}",
            what,
            json_kind(&other)
        ))),
    }
}

/// Fill the primary key from the requested identifier when the payload omits it
pub(crate) fn default_key(map: &mut Map<String, Value>, key: &str, id: &str) {
    let value = map
        .get(key)
        .and_then(identifier_string)
        .unwrap_or_else(|| id.to_string());
    map.insert(key.to_string(), Value::String(value));
}

/// Numeric identifiers and coordinates are stored as text
pub(crate) fn stringify_field(map: &mut Map<String, Value>, key: &str) {
    if let Some(Value::Number(n)) = map.get(key) {
        let text = n.to_string();
        map.insert(key.to_string(), Value::String(text));
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
