//! Source reader: loads the four tabular extracts fully into memory.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::constants::is_null_marker;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::schema;

/// The four source extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    Provider,
    Beneficiary,
    Inpatient,
    Outpatient,
}

impl SourceTable {
    pub const ALL: [SourceTable; 4] = [
        SourceTable::Provider,
        SourceTable::Beneficiary,
        SourceTable::Inpatient,
        SourceTable::Outpatient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTable::Provider => "provider",
            SourceTable::Beneficiary => "beneficiary",
            SourceTable::Inpatient => "inpatient",
            SourceTable::Outpatient => "outpatient",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw source row: column name to raw cell text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    values: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from (column, value) pairs; handy for fixtures.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    /// Trimmed cell value, or `None` when the column is absent or holds a null marker.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !is_null_marker(v))
    }

    pub fn is_null(&self, column: &str) -> bool {
        self.get(column).is_none()
    }
}

/// All rows of one extract.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub table: SourceTable,
    pub rows: Vec<RawRow>,
    /// Cells per column that were not valid UTF-8 and were decoded lossily
    pub undecodable_cells: BTreeMap<String, u64>,
}

impl RawTable {
    pub fn new(table: SourceTable, rows: Vec<RawRow>) -> Self {
        Self {
            table,
            rows,
            undecodable_cells: BTreeMap::new(),
        }
    }
}

/// The four extracts, read once per run.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub providers: RawTable,
    pub beneficiaries: RawTable,
    pub inpatient: RawTable,
    pub outpatient: RawTable,
}

impl RawDataset {
    pub fn new(
        providers: Vec<RawRow>,
        beneficiaries: Vec<RawRow>,
        inpatient: Vec<RawRow>,
        outpatient: Vec<RawRow>,
    ) -> Self {
        Self {
            providers: RawTable::new(SourceTable::Provider, providers),
            beneficiaries: RawTable::new(SourceTable::Beneficiary, beneficiaries),
            inpatient: RawTable::new(SourceTable::Inpatient, inpatient),
            outpatient: RawTable::new(SourceTable::Outpatient, outpatient),
        }
    }

    pub fn total_rows(&self) -> usize {
        self.providers.rows.len()
            + self.beneficiaries.rows.len()
            + self.inpatient.rows.len()
            + self.outpatient.rows.len()
    }
}

/// Paths of the four extracts.
#[derive(Debug, Clone)]
pub struct SourcePaths<P: AsRef<Path>> {
    pub provider: P,
    pub beneficiary: P,
    pub inpatient: P,
    pub outpatient: P,
}

/// Reads one CSV extract. The header must carry the table's mandatory key columns.
pub fn read_table<P: AsRef<Path>>(path: P, table: SourceTable) -> Result<RawTable> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    let csv_err = |source: csv::Error| PipelineError::Csv {
        path: shown.clone(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();

    for required in schema::required_header(table) {
        if !headers.iter().any(|h| h == required) {
            return Err(PipelineError::MissingColumn {
                table: table.to_string(),
                column: required.to_string(),
            });
        }
    }

    // Bad encoding in one cell must not cost the whole extract
    let mut rows = Vec::new();
    let mut undecodable_cells: BTreeMap<String, u64> = BTreeMap::new();
    for record in reader.byte_records() {
        let record = record.map_err(csv_err)?;
        let mut row = RawRow::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            let cell = String::from_utf8_lossy(value);
            if let Cow::Owned(_) = cell {
                *undecodable_cells.entry(header.clone()).or_insert(0) += 1;
            }
            row.insert(header.as_str(), cell);
        }
        rows.push(row);
    }

    if !undecodable_cells.is_empty() {
        warn!(
            "{}: {} cells were not valid UTF-8 and were decoded lossily",
            shown,
            undecodable_cells.values().sum::<u64>()
        );
    }
    debug!(table = %table, path = %shown, rows = rows.len(), "Read extract");
    Ok(RawTable {
        table,
        rows,
        undecodable_cells,
    })
}

/// Reads all four extracts into memory.
pub fn read_dataset<P: AsRef<Path>>(paths: &SourcePaths<P>) -> Result<RawDataset> {
    let dataset = RawDataset {
        providers: read_table(&paths.provider, SourceTable::Provider)?,
        beneficiaries: read_table(&paths.beneficiary, SourceTable::Beneficiary)?,
        inpatient: read_table(&paths.inpatient, SourceTable::Inpatient)?,
        outpatient: read_table(&paths.outpatient, SourceTable::Outpatient)?,
    };
    info!(
        providers = dataset.providers.rows.len(),
        beneficiaries = dataset.beneficiaries.rows.len(),
        inpatient = dataset.inpatient.rows.len(),
        outpatient = dataset.outpatient.rows.len(),
        "Loaded source extracts"
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_null_markers_read_as_absent() {
        let row = RawRow::from_pairs([("A", "  x "), ("B", ""), ("C", "NA")]);

        assert_eq!(row.get("A"), Some("x"));
        assert!(row.is_null("B"));
        assert!(row.is_null("C"));
        assert!(row.is_null("missing"));
    }

    #[test]
    fn test_read_table_maps_headers_to_cells() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Provider,PotentialFraud").unwrap();
        writeln!(file, "PRV1,Yes").unwrap();
        writeln!(file, ",No").unwrap();

        let table = read_table(file.path(), SourceTable::Provider).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("Provider"), Some("PRV1"));
        assert!(table.rows[1].is_null("Provider"));
    }

    #[test]
    fn test_read_table_rejects_missing_key_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Prov,PotentialFraud").unwrap();
        writeln!(file, "PRV1,Yes").unwrap();

        let err = read_table(file.path(), SourceTable::Provider).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn test_invalid_utf8_cell_is_decoded_and_counted() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ClaimID,Provider,BeneID,OtherPhysician\n").unwrap();
        file.write_all(b"CLM1,PRV1,BENE1,PHY1\n").unwrap();
        file.write_all(b"CLM2,PRV1,BENE1,PH\xE9Y2\n").unwrap();
        file.write_all(b"CLM3,PRV2,BENE2,\n").unwrap();

        let table = read_table(file.path(), SourceTable::Outpatient).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1].get("ClaimID"), Some("CLM2"));
        assert_eq!(table.rows[1].get("OtherPhysician"), Some("PH\u{FFFD}Y2"));
        assert_eq!(table.rows[2].get("ClaimID"), Some("CLM3"));
        assert_eq!(table.undecodable_cells["OtherPhysician"], 1);
        assert_eq!(table.undecodable_cells.len(), 1);
    }
}
