//! Locations referenced by checked medias
//!
//! Saving a location also marks every media pointing at it, under row locks,
//! in the same transaction.

use super::{default_key, expect_object, stringify_field, Extractor};
use crate::client::SourceClient;
use crate::error::{IngestError, Result};
use crate::records::{ColumnValue, Record, Table};
use crate::source::WorkSource;
use crate::store::{ReferenceUpdate, UncheckedQuery, UpsertRequest};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct LocationExtractor {
    client: Arc<dyn SourceClient>,
}

impl LocationExtractor {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }
}

/// The source embeds the address as a JSON document inside a string
fn parse_address(payload: &mut Map<String, Value>) -> Result<()> {
    let Some(Value::String(raw)) = payload.get("address_json") else {
        return Ok(());
    };

    let address = if raw.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(raw)
            .map_err(|e| IngestError::validation(format!("address_json is not JSON: {}", e)))?
    };
    payload.insert("address_json".to_string(), address);
    Ok(())
}

#[async_trait]
impl Extractor for LocationExtractor {
    fn name(&self) -> &'static str {
        "location"
    }

    fn work_source(&self) -> WorkSource {
        WorkSource::Unchecked {
            query: UncheckedQuery {
                table: Table::Media,
                checkpoint_column: "location_checked_time",
                source_column: "location_id",
                priority_column: Some("likes_count"),
            },
            deduplicate: true,
        }
    }

    async fn fetch(&self, location_id: &str) -> anyhow::Result<Option<Value>> {
        self.client.location_by_id(location_id).await
    }

    fn prepare(&self, location_id: &str, raw: Value, checked_at: i64) -> Result<UpsertRequest> {
        let mut payload = expect_object(raw, "location")?;
        default_key(&mut payload, "identifier", location_id);
        stringify_field(&mut payload, "lat");
        stringify_field(&mut payload, "lng");
        parse_address(&mut payload)?;

        let record = Record::validate(Table::Location, Value::Object(payload))?;
        let update = ReferenceUpdate {
            table: Table::Media,
            match_column: "location_id",
            match_value: record.primary_key().to_string(),
            set: vec![("location_checked_time", ColumnValue::Integer(checked_at))],
        };

        Ok(UpsertRequest::new(Table::Location, vec![record]).with_reference_update(update))
    }
}
