//! Individual comments of medias whose comments were not collected yet

use super::{expect_array, identifier_string, Extractor};
use crate::client::SourceClient;
use crate::error::{IngestError, Result};
use crate::records::{ColumnValue, Comment, Record, Table};
use crate::source::WorkSource;
use crate::store::{ReferenceUpdate, UncheckedQuery, UpsertRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub struct CommentsExtractor {
    client: Arc<dyn SourceClient>,
}

impl CommentsExtractor {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }
}

fn to_comment(short_code: &str, raw: &Value) -> Result<Comment> {
    let identifier = raw
        .get("identifier")
        .and_then(identifier_string)
        .ok_or_else(|| IngestError::validation("comment has no identifier"))?;
    let owner = raw
        .get("owner")
        .and_then(|owner| owner.get("identifier"))
        .or_else(|| raw.get("owner_id"))
        .and_then(identifier_string);
    let text = raw.get("text").and_then(Value::as_str).map(str::to_string);

    Ok(Comment {
        identifier,
        owner,
        text,
        media_short_code: Some(short_code.to_string()),
    })
}

#[async_trait]
impl Extractor for CommentsExtractor {
    fn name(&self) -> &'static str {
        "comments"
    }

    fn work_source(&self) -> WorkSource {
        WorkSource::Unchecked {
            query: UncheckedQuery {
                table: Table::Media,
                checkpoint_column: "comments_checked_time",
                source_column: "short_code",
                priority_column: Some("likes_count"),
            },
            deduplicate: false,
        }
    }

    async fn fetch(&self, short_code: &str) -> anyhow::Result<Option<Value>> {
        self.client.comments_by_code(short_code).await
    }

    /// An empty comment list still checkpoints the media
    fn prepare(&self, short_code: &str, raw: Value, checked_at: i64) -> Result<UpsertRequest> {
        let mut records = Vec::new();
        for raw_comment in expect_array(raw, "comments")? {
            match to_comment(short_code, &raw_comment) {
                Ok(comment) => records.push(Record::Comment(comment)),
                Err(e) => warn!(media = %short_code, error = %e, "Skipping comment"),
            }
        }

        let update = ReferenceUpdate {
            table: Table::Media,
            match_column: "short_code",
            match_value: short_code.to_string(),
            set: vec![("comments_checked_time", ColumnValue::Integer(checked_at))],
        };
        Ok(UpsertRequest::new(Table::Comment, records).with_reference_update(update))
    }
}
