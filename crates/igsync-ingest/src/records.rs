//! Record schemas and validation
//!
//! A fetched payload becomes a [`Record`] only through [`Record::validate`].
//! Each record knows its [`Table`] and can list its non-null columns, which is
//! what the store merges: a column that is absent here is never written, so
//! a partial payload cannot erase a value stored by an earlier run.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};

/// Storage tables owned by the ingestion pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Media,
    Location,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Json,
}

const MEDIA_COLUMNS: &[(&str, ColumnType)] = &[
    ("short_code", ColumnType::Text),
    ("created_time", ColumnType::Integer),
    ("media_checked_time", ColumnType::Integer),
    ("location_checked_time", ColumnType::Integer),
    ("comments_checked_time", ColumnType::Integer),
    ("caption", ColumnType::Text),
    ("likes_count", ColumnType::Integer),
    ("comments_count", ColumnType::Integer),
    ("comments", ColumnType::Json),
    ("image_high_resolution_url", ColumnType::Text),
    ("accessibility_caption", ColumnType::Text),
    ("location_id", ColumnType::Text),
    ("tag", ColumnType::Text),
];

const LOCATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("identifier", ColumnType::Text),
    ("name", ColumnType::Text),
    ("lat", ColumnType::Text),
    ("lng", ColumnType::Text),
    ("address_json", ColumnType::Json),
];

const COMMENT_COLUMNS: &[(&str, ColumnType)] = &[
    ("identifier", ColumnType::Text),
    ("owner", ColumnType::Text),
    ("text", ColumnType::Text),
    ("media_short_code", ColumnType::Text),
];

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Media => "top_medias",
            Table::Location => "location",
            Table::Comment => "comment",
        }
    }

    pub fn primary_key(self) -> &'static str {
        match self {
            Table::Media => "short_code",
            Table::Location | Table::Comment => "identifier",
        }
    }

    pub fn columns(self) -> &'static [(&'static str, ColumnType)] {
        match self {
            Table::Media => MEDIA_COLUMNS,
            Table::Location => LOCATION_COLUMNS,
            Table::Comment => COMMENT_COLUMNS,
        }
    }

    pub fn column_type(self, column: &str) -> Option<ColumnType> {
        self.columns()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, ty)| *ty)
    }

    /// Fail unless `column` exists on this table
    pub fn require_column(self, column: &str) -> Result<ColumnType> {
        self.column_type(column).ok_or_else(|| {
            IngestError::validation(format!("{} has no column {:?}", self.name(), column))
        })
    }
}

/// A single non-null column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
    Json(serde_json::Value),
}

impl ColumnValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValue::Text(_) => ColumnType::Text,
            ColumnValue::Integer(_) => ColumnType::Integer,
            ColumnValue::Json(_) => ColumnType::Json,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// A row of `top_medias`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub short_code: String,
    pub created_time: Option<i64>,
    pub media_checked_time: Option<i64>,
    pub location_checked_time: Option<i64>,
    pub comments_checked_time: Option<i64>,
    pub caption: Option<String>,
    pub likes_count: Option<i64>,
    pub comments_count: Option<i64>,
    pub comments: Option<serde_json::Value>,
    pub image_high_resolution_url: Option<String>,
    pub accessibility_caption: Option<String>,
    pub location_id: Option<String>,
    pub tag: Option<String>,
}

/// A row of `location`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub identifier: String,
    pub name: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub address_json: Option<serde_json::Value>,
}

/// A row of `comment`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub identifier: String,
    pub owner: Option<String>,
    pub text: Option<String>,
    pub media_short_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Media(Media),
    Location(Location),
    Comment(Comment),
}

/// Collects the non-null columns of a record in schema order
#[derive(Default)]
struct Columns(Vec<(&'static str, ColumnValue)>);

impl Columns {
    fn text(mut self, name: &'static str, value: &Option<String>) -> Self {
        if let Some(v) = value {
            self.0.push((name, ColumnValue::Text(v.clone())));
        }
        self
    }

    fn key(mut self, name: &'static str, value: &str) -> Self {
        self.0.push((name, ColumnValue::Text(value.to_string())));
        self
    }

    fn integer(mut self, name: &'static str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.0.push((name, ColumnValue::Integer(v)));
        }
        self
    }

    fn json(mut self, name: &'static str, value: &Option<serde_json::Value>) -> Self {
        if let Some(v) = value.as_ref().filter(|v| !v.is_null()) {
            self.0.push((name, ColumnValue::Json(v.clone())));
        }
        self
    }
}

impl Record {
    /// Validate a raw payload against `table`
    ///
    /// Unknown fields are ignored. The primary key must be a non-blank string.
    pub fn validate(table: Table, raw: serde_json::Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(IngestError::validation(format!(
                "{} payload must be an object",
                table.name()
            )));
        }

        let invalid =
            |e: serde_json::Error| IngestError::validation(format!("{}: {}", table.name(), e));

        let record = match table {
            Table::Media => Record::Media(serde_json::from_value(raw).map_err(invalid)?),
            Table::Location => Record::Location(serde_json::from_value(raw).map_err(invalid)?),
            Table::Comment => Record::Comment(serde_json::from_value(raw).map_err(invalid)?),
        };

        if record.primary_key().trim().is_empty() {
            return Err(IngestError::validation(format!(
                "{} record has an empty {}",
                table.name(),
                table.primary_key()
            )));
        }

        Ok(record)
    }

    pub fn table(&self) -> Table {
        match self {
            Record::Media(_) => Table::Media,
            Record::Location(_) => Table::Location,
            Record::Comment(_) => Table::Comment,
        }
    }

    pub fn primary_key(&self) -> &str {
        match self {
            Record::Media(m) => &m.short_code,
            Record::Location(l) => &l.identifier,
            Record::Comment(c) => &c.identifier,
        }
    }

    /// Non-null columns, primary key first
    pub fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        let columns = match self {
            Record::Media(m) => Columns::default()
                .key("short_code", &m.short_code)
                .integer("created_time", m.created_time)
                .integer("media_checked_time", m.media_checked_time)
                .integer("location_checked_time", m.location_checked_time)
                .integer("comments_checked_time", m.comments_checked_time)
                .text("caption", &m.caption)
                .integer("likes_count", m.likes_count)
                .integer("comments_count", m.comments_count)
                .json("comments", &m.comments)
                .text("image_high_resolution_url", &m.image_high_resolution_url)
                .text("accessibility_caption", &m.accessibility_caption)
                .text("location_id", &m.location_id)
                .text("tag", &m.tag),
            Record::Location(l) => Columns::default()
                .key("identifier", &l.identifier)
                .text("name", &l.name)
                .text("lat", &l.lat)
                .text("lng", &l.lng)
                .json("address_json", &l.address_json),
            Record::Comment(c) => Columns::default()
                .key("identifier", &c.identifier)
                .text("owner", &c.owner)
                .text("text", &c.text)
                .text("media_short_code", &c.media_short_code),
        };
        columns.0
    }
}
