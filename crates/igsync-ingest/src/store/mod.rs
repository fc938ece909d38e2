//! Checkpointed storage
//!
//! [`CheckpointedStore`] is the storage contract the pipeline depends on:
//! select the identifiers that still lack a checkpoint, and upsert a batch of
//! records together with their checkpoint stamp and an optional locked update
//! of referencing rows, all in one transaction.
//!
//! Two implementations share the contract:
//! - [`PgStore`]: PostgreSQL through `sqlx`
//! - [`MemoryStore`]: in-process, for tests and dry runs

mod memory;
mod postgres;

pub use memory::{MemoryStore, Row};
pub use postgres::{DatabaseConfig, PgStore};

use crate::error::{IngestError, Result};
use crate::records::{ColumnType, ColumnValue, Record, Table};
use async_trait::async_trait;
use serde::Serialize;

/// Rows whose checkpoint is unset but whose source column is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncheckedQuery {
    pub table: Table,
    pub checkpoint_column: &'static str,
    pub source_column: &'static str,
    /// Highest values first, nulls last
    pub priority_column: Option<&'static str>,
}

impl UncheckedQuery {
    pub fn validate(&self) -> Result<()> {
        if self.table.require_column(self.checkpoint_column)? != ColumnType::Integer {
            return Err(IngestError::validation(format!(
                "checkpoint column {} must hold epoch seconds",
                self.checkpoint_column
            )));
        }
        if self.table.require_column(self.source_column)? != ColumnType::Text {
            return Err(IngestError::validation(format!(
                "source column {} must hold text identifiers",
                self.source_column
            )));
        }
        if let Some(priority) = self.priority_column {
            self.table.require_column(priority)?;
        }
        Ok(())
    }
}

/// Locked update of rows in another table that reference the upserted item
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceUpdate {
    pub table: Table,
    pub match_column: &'static str,
    pub match_value: String,
    pub set: Vec<(&'static str, ColumnValue)>,
}

/// One atomic write: records, their stamp, and an optional reference update
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
    pub table: Table,
    pub records: Vec<Record>,
    /// Columns applied to every record before the merge
    pub stamp: Vec<(&'static str, ColumnValue)>,
    pub reference_update: Option<ReferenceUpdate>,
}

impl UpsertRequest {
    pub fn new(table: Table, records: Vec<Record>) -> Self {
        Self {
            table,
            records,
            stamp: Vec::new(),
            reference_update: None,
        }
    }

    pub fn with_stamp(mut self, column: &'static str, value: ColumnValue) -> Self {
        self.stamp.push((column, value));
        self
    }

    pub fn with_reference_update(mut self, update: ReferenceUpdate) -> Self {
        self.reference_update = Some(update);
        self
    }

    /// Check every record, stamp and reference column against the schema
    pub fn validate(&self) -> Result<()> {
        for record in &self.records {
            if record.table() != self.table {
                return Err(IngestError::validation(format!(
                    "{} record {} in a {} upsert",
                    record.table().name(),
                    record.primary_key(),
                    self.table.name()
                )));
            }
        }

        check_assignments(self.table, &self.stamp)?;
        if self
            .stamp
            .iter()
            .any(|(column, _)| *column == self.table.primary_key())
        {
            return Err(IngestError::validation("stamp cannot overwrite the primary key"));
        }

        if let Some(update) = &self.reference_update {
            update.table.require_column(update.match_column)?;
            if update.set.is_empty() {
                return Err(IngestError::validation("reference update sets no columns"));
            }
            check_assignments(update.table, &update.set)?;
        }

        Ok(())
    }

    /// Columns to merge for one record: its non-null columns overlaid with the stamp
    pub fn merged_columns(&self, record: &Record) -> Vec<(&'static str, ColumnValue)> {
        let mut columns = record.columns();
        for (name, value) in &self.stamp {
            match columns.iter_mut().find(|(c, _)| c == name) {
                Some(slot) => slot.1 = value.clone(),
                None => columns.push((*name, value.clone())),
            }
        }
        columns
    }
}

fn check_assignments(table: Table, assignments: &[(&'static str, ColumnValue)]) -> Result<()> {
    for (column, value) in assignments {
        let expected = table.require_column(column)?;
        if expected != value.column_type() {
            return Err(IngestError::validation(format!(
                "{}.{} expects {:?}, got {:?}",
                table.name(),
                column,
                expected,
                value.column_type()
            )));
        }
    }
    Ok(())
}

/// What an upsert changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub records_written: usize,
    pub references_marked: u64,
}

#[async_trait]
pub trait CheckpointedStore: Send + Sync {
    /// Source column values of unchecked rows, in priority order
    ///
    /// Values are not deduplicated; see [`crate::source::unique_in_order`].
    async fn select_unchecked(&self, query: &UncheckedQuery) -> Result<Vec<String>>;

    /// Apply `request` atomically: everything commits or nothing does
    async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertOutcome>;
}
