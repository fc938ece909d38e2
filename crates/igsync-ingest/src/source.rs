//! Work item enumeration
//!
//! A [`WorkSource`] lists the identifiers one pipeline run should process:
//! either a fixed list from configuration, or the rows of a table that still
//! lack a checkpoint.

use crate::error::Result;
use crate::store::{CheckpointedStore, UncheckedQuery};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkSource {
    /// Fixed identifiers, e.g. search tags
    StaticList(Vec<String>),
    /// Source column values of rows whose checkpoint is still unset
    Unchecked {
        query: UncheckedQuery,
        /// Drop repeated identifiers, keeping first-seen (priority) order
        deduplicate: bool,
    },
}

impl WorkSource {
    /// Identifiers to process, or `None` when the query matched no rows
    ///
    /// `None` is distinct from an empty list: a static list that is empty
    /// still yields `Some(vec![])`.
    pub async fn list(&self, store: &dyn CheckpointedStore) -> Result<Option<Vec<String>>> {
        match self {
            WorkSource::StaticList(items) => Ok(Some(items.clone())),
            WorkSource::Unchecked { query, deduplicate } => {
                let rows = store.select_unchecked(query).await?;
                if rows.is_empty() {
                    info!(
                        table = query.table.name(),
                        checkpoint = query.checkpoint_column,
                        "No rows need to be checked"
                    );
                    return Ok(None);
                }

                let matched = rows.len();
                let items = if *deduplicate {
                    unique_in_order(rows)
                } else {
                    rows
                };
                info!(
                    table = query.table.name(),
                    checkpoint = query.checkpoint_column,
                    rows = matched,
                    items = items.len(),
                    "Rows need to be checked"
                );
                Ok(Some(items))
            },
        }
    }
}

/// Remove repeats while keeping the first occurrence of each value
pub fn unique_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
