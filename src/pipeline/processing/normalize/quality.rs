use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pipeline::ingestion::SourceTable;

/// Data-quality tallies for one source table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableQuality {
    pub rows_read: u64,
    pub rows_kept: u64,
    pub rows_dropped: u64,
    /// Null cells per contract column, counted over every row read
    pub null_counts: BTreeMap<String, u64>,
    /// Cells present but unparsable (dates, amounts, flags)
    pub invalid_values: BTreeMap<String, u64>,
    /// Dropped rows per missing mandatory key column
    pub missing_keys: BTreeMap<String, u64>,
}

impl TableQuality {
    pub fn drop_rate(&self) -> f64 {
        if self.rows_read == 0 {
            0.0
        } else {
            self.rows_dropped as f64 / self.rows_read as f64
        }
    }

    pub fn null_count(&self, column: &str) -> u64 {
        self.null_counts.get(column).copied().unwrap_or(0)
    }

    pub fn invalid_count(&self, column: &str) -> u64 {
        self.invalid_values.get(column).copied().unwrap_or(0)
    }

    pub(crate) fn bump_null(&mut self, column: &str) {
        *self.null_counts.entry(column.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn bump_invalid(&mut self, column: &str) {
        *self.invalid_values.entry(column.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn bump_missing_key(&mut self, column: &str) {
        *self.missing_keys.entry(column.to_string()).or_insert(0) += 1;
    }
}

/// Null and drop counts per source table, returned alongside normalized rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub reference_date: NaiveDate,
    pub tables: BTreeMap<SourceTable, TableQuality>,
}

impl QualityReport {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            tables: SourceTable::ALL
                .iter()
                .map(|t| (*t, TableQuality::default()))
                .collect(),
        }
    }

    pub fn table(&self, table: SourceTable) -> &TableQuality {
        // Every table is seeded in `new`
        &self.tables[&table]
    }

    pub(crate) fn table_mut(&mut self, table: SourceTable) -> &mut TableQuality {
        self.tables.entry(table).or_default()
    }

    pub fn rows_dropped(&self, table: SourceTable) -> u64 {
        self.table(table).rows_dropped
    }

    pub fn total_dropped(&self) -> u64 {
        self.tables.values().map(|t| t.rows_dropped).sum()
    }

    pub fn total_read(&self) -> u64 {
        self.tables.values().map(|t| t.rows_read).sum()
    }
}
