//! Full media details for medias not yet checked

use super::{default_key, expect_object, identifier_string, stringify_field, Extractor};
use crate::client::SourceClient;
use crate::error::Result;
use crate::records::{ColumnValue, Record, Table};
use crate::source::WorkSource;
use crate::store::{UncheckedQuery, UpsertRequest};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct MediaExtractor {
    client: Arc<dyn SourceClient>,
}

impl MediaExtractor {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }
}

/// Group comment texts by commenter: `{owner_id: [text, ...]}`
///
/// Comments without an owner or text are skipped. An empty or missing list
/// leaves the payload unchanged.
fn flatten_comments(payload: &mut Map<String, Value>) {
    let Some(Value::Array(comments)) = payload.get("comments") else {
        return;
    };
    if comments.is_empty() {
        return;
    }

    let mut by_owner: Map<String, Value> = Map::new();
    for comment in comments {
        let owner = comment
            .get("owner")
            .and_then(|owner| owner.get("identifier"))
            .and_then(identifier_string);
        let text = comment.get("text").and_then(Value::as_str);
        let (Some(owner), Some(text)) = (owner, text) else {
            continue;
        };

        if let Value::Array(texts) = by_owner
            .entry(owner)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            texts.push(Value::String(text.to_string()));
        }
    }

    payload.insert("comments".to_string(), Value::Object(by_owner));
}

#[async_trait]
impl Extractor for MediaExtractor {
    fn name(&self) -> &'static str {
        "media"
    }

    fn work_source(&self) -> WorkSource {
        WorkSource::Unchecked {
            query: UncheckedQuery {
                table: Table::Media,
                checkpoint_column: "media_checked_time",
                source_column: "short_code",
                priority_column: Some("likes_count"),
            },
            deduplicate: false,
        }
    }

    async fn fetch(&self, short_code: &str) -> anyhow::Result<Option<Value>> {
        self.client.media_by_code(short_code).await
    }

    fn prepare(&self, short_code: &str, raw: Value, checked_at: i64) -> Result<UpsertRequest> {
        let mut payload = expect_object(raw, "media")?;
        default_key(&mut payload, "short_code", short_code);
        stringify_field(&mut payload, "location_id");
        flatten_comments(&mut payload);

        let record = Record::validate(Table::Media, Value::Object(payload))?;
        Ok(UpsertRequest::new(Table::Media, vec![record])
            .with_stamp("media_checked_time", ColumnValue::Integer(checked_at)))
    }
}
