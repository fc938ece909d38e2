//! In-process store with the same transactional contract as Postgres
//!
//! Every upsert is applied to a copy of the tables and swapped in only when
//! all of its writes succeed.

use super::{CheckpointedStore, UncheckedQuery, UpsertOutcome, UpsertRequest};
use crate::error::{IngestError, Result};
use crate::records::{ColumnValue, Table};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// One stored row, keyed by column name
pub type Row = BTreeMap<String, ColumnValue>;

type Tables = BTreeMap<Table, BTreeMap<String, Row>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    rejected_keys: Mutex<BTreeSet<(Table, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, bypassing validation
    pub fn seed(&self, table: Table, row: Row) -> Result<()> {
        let key = row
            .get(table.primary_key())
            .and_then(ColumnValue::as_text)
            .ok_or_else(|| {
                IngestError::validation(format!("seed row for {} has no primary key", table.name()))
            })?
            .to_string();
        self.lock()?.entry(table).or_default().insert(key, row);
        Ok(())
    }

    pub fn get(&self, table: Table, key: &str) -> Option<Row> {
        self.lock()
            .ok()
            .and_then(|tables| tables.get(&table).and_then(|rows| rows.get(key)).cloned())
    }

    pub fn len(&self, table: Table) -> usize {
        self.lock()
            .map(|tables| tables.get(&table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.lock()
            .map(|tables| tables.values().all(BTreeMap::is_empty))
            .unwrap_or(true)
    }

    /// Make every future upsert touching `key` in `table` fail, like a constraint violation
    pub fn reject_key(&self, table: Table, key: impl Into<String>) {
        if let Ok(mut rejected) = self.rejected_keys.lock() {
            rejected.insert((table, key.into()));
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| IngestError::persistence("memory store lock poisoned"))
    }

    fn is_rejected(&self, table: Table, key: &str) -> bool {
        self.rejected_keys
            .lock()
            .map(|rejected| rejected.contains(&(table, key.to_string())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CheckpointedStore for MemoryStore {
    async fn select_unchecked(&self, query: &UncheckedQuery) -> Result<Vec<String>> {
        query.validate()?;
        let tables = self.lock()?;
        let Some(rows) = tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<(Option<i64>, String)> = rows
            .values()
            .filter(|row| !row.contains_key(query.checkpoint_column))
            .filter_map(|row| {
                let source = row.get(query.source_column)?.as_text()?.to_string();
                let priority = query
                    .priority_column
                    .and_then(|column| row.get(column))
                    .and_then(ColumnValue::as_integer);
                Some((priority, source))
            })
            .collect();

        // Descending with nulls last: None sorts below every Some.
        matches.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(matches.into_iter().map(|(_, source)| source).collect())
    }

    async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertOutcome> {
        request.validate()?;
        let mut tables = self.lock()?;
        let mut staged = tables.clone();

        let rows = staged.entry(request.table).or_default();
        for record in &request.records {
            let key = record.primary_key();
            if self.is_rejected(request.table, key) {
                return Err(IngestError::persistence(format!(
                    "{} row {} rejected, transaction rolled back",
                    request.table.name(),
                    key
                )));
            }

            let row = rows.entry(key.to_string()).or_default();
            for (column, value) in request.merged_columns(record) {
                row.insert(column.to_string(), value);
            }
        }

        let mut references_marked = 0;
        if let Some(update) = &request.reference_update {
            let referencing = staged.entry(update.table).or_default();
            for (key, row) in referencing.iter_mut() {
                let matched = row
                    .get(update.match_column)
                    .and_then(ColumnValue::as_text)
                    .is_some_and(|value| value == update.match_value);
                if !matched {
                    continue;
                }
                if self.is_rejected(update.table, key) {
                    return Err(IngestError::persistence(format!(
                        "{} row {} rejected, transaction rolled back",
                        update.table.name(),
                        key
                    )));
                }
                for (column, value) in &update.set {
                    row.insert(column.to_string(), value.clone());
                }
                references_marked += 1;
            }
        }

        *tables = staged;
        debug!(
            table = request.table.name(),
            records = request.records.len(),
            references_marked,
            "Committed upsert"
        );

        Ok(UpsertOutcome {
            records_written: request.records.len(),
            references_marked,
        })
    }
}
