//! Top medias of each search tag, kept only when the image looks like food

use super::{expect_array, expect_object, stringify_field, Extractor};
use crate::client::SourceClient;
use crate::error::{IngestError, Result};
use crate::records::{ColumnValue, Record, Table};
use crate::source::WorkSource;
use crate::store::UpsertRequest;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Match generated image descriptions such as "May be an image of food and drink"
pub fn food_filter(keywords: &[String]) -> Result<Regex> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Err(IngestError::Config("food keyword list is empty".to_string()));
    }

    Regex::new(&format!("(?:May be).*?({})", alternatives.join("|")))
        .map_err(|e| IngestError::Config(format!("invalid food filter: {}", e)))
}

pub struct TopMediasExtractor {
    client: Arc<dyn SourceClient>,
    search_tags: Vec<String>,
    food_filter: Regex,
}

impl TopMediasExtractor {
    pub fn new(
        client: Arc<dyn SourceClient>,
        search_tags: Vec<String>,
        food_keywords: &[String],
    ) -> Result<Self> {
        Ok(Self {
            client,
            search_tags,
            food_filter: food_filter(food_keywords)?,
        })
    }

    fn is_food(&self, media: &Value) -> bool {
        media
            .get("accessibility_caption")
            .and_then(Value::as_str)
            .is_some_and(|caption| self.food_filter.is_match(caption))
    }
}

#[async_trait]
impl Extractor for TopMediasExtractor {
    fn name(&self) -> &'static str {
        "top_medias"
    }

    fn work_source(&self) -> WorkSource {
        WorkSource::StaticList(self.search_tags.clone())
    }

    async fn fetch(&self, tag: &str) -> anyhow::Result<Option<Value>> {
        self.client.top_medias_by_tag(tag).await
    }

    fn prepare(&self, tag: &str, raw: Value, _checked_at: i64) -> Result<UpsertRequest> {
        let medias = expect_array(raw, "top medias")?;
        let fetched = medias.len();

        let records = medias
            .into_iter()
            .filter(|media| self.is_food(media))
            .map(|media| {
                let mut payload = expect_object(media, "media")?;
                stringify_field(&mut payload, "location_id");
                Record::validate(Table::Media, Value::Object(payload))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(tag = %tag, fetched, kept = records.len(), "Filtered top medias");

        Ok(UpsertRequest::new(Table::Media, records)
            .with_stamp("tag", ColumnValue::Text(tag.to_string())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::client::OfflineSource;
    use serde_json::json;

    fn keywords() -> Vec<String> {
        vec!["food".into(), "drink".into(), "dessert".into()]
    }

    #[test]
    fn test_food_filter_requires_generated_prefix() {
        let filter = food_filter(&keywords()).unwrap();
        assert!(filter.is_match("May be an image of food and indoor"));
        assert!(filter.is_match("Photo by x. May be an image of 1 person and dessert"));
        assert!(!filter.is_match("food on a table"));
        assert!(!filter.is_match("May be an image of 2 people"));
    }

    #[test]
    fn test_food_filter_rejects_empty_keywords() {
        assert!(food_filter(&[" ".to_string()]).is_err());
    }

    #[test]
    fn test_prepare_keeps_food_and_stamps_tag() {
        let extractor =
            TopMediasExtractor::new(Arc::new(OfflineSource), vec!["台北美食".into()], &keywords()).unwrap();
        let raw = json!([
            {"short_code": "B1", "accessibility_caption": "May be an image of food", "likes_count": 9},
            {"short_code": "B2", "accessibility_caption": "May be an image of a cat"},
            {"short_code": "B3"},
        ]);

        let request = extractor.prepare("台北美食", raw, 0).unwrap();

        assert_eq!(request.records.len(), 1);
        assert_eq!(request.records[0].primary_key(), "B1");
        assert_eq!(
            request.stamp,
            vec![("tag", ColumnValue::Text("台北美食".into()))]
        );
        assert!(request.reference_update.is_none());
    }

    #[test]
    fn test_prepare_rejects_non_array() {
        let extractor = TopMediasExtractor::new(Arc::new(OfflineSource), vec![], &keywords()).unwrap();
        assert!(extractor.prepare("x", json!({"short_code": "B1"}), 0).is_err());
    }
}
