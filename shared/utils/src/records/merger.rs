//! Table Merger
//!
//! Accumulates application and medication rows in two CSV tables. Each merge
//! loads the existing table, appends the new rows, drops exact full-row
//! duplicates and rewrites the whole file.
//!
//! There is no locking: two processes merging into the same directory at
//! once can lose rows.

use indexmap::IndexSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use intake_models::{text_cell, ApplicationRecord, Cell, MedicationRecord, TableRecord};

use crate::error::{IntakeError, IntakeResult};

pub const APPLICATIONS_TABLE: &str = "applications.csv";
pub const MEDICATIONS_TABLE: &str = "medications.csv";

/// An in-memory table with an ordered column set and optional cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexSet<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from typed records, using the record's column order.
    pub fn from_records<R: TableRecord>(records: &[R]) -> Self {
        let mut table = Self::new(R::COLUMNS.iter().copied());
        table.rows = records.iter().map(|r| r.cells()).collect();
        table
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` in `column`, `None` when missing or out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.get_index_of(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Append a row given in this table's column order. Short rows are
    /// padded with missing cells; extra cells are rejected.
    pub fn push_row(&mut self, mut cells: Vec<Cell>) -> IntakeResult<()> {
        if cells.len() > self.columns.len() {
            return Err(IntakeError::validation(
                "row",
                format!(
                    "row has {} cells but the table has {} columns",
                    cells.len(),
                    self.columns.len()
                ),
            ));
        }
        cells.resize(self.columns.len(), None);
        self.rows.push(cells);
        Ok(())
    }

    /// Append `other` beneath this table. Columns are outer-joined: columns
    /// only `other` has are added at the end, and cells a row lacks are
    /// missing.
    pub fn append(&mut self, other: Table) {
        for column in &other.columns {
            if self.columns.insert(column.clone()) {
                for row in &mut self.rows {
                    row.push(None);
                }
            }
        }

        let positions: Vec<usize> = other
            .columns
            .iter()
            .filter_map(|c| self.columns.get_index_of(c))
            .collect();

        for row in other.rows {
            let mut aligned = vec![None; self.columns.len()];
            for (cell, &target) in row.into_iter().zip(&positions) {
                aligned[target] = cell;
            }
            self.rows.push(aligned);
        }
    }

    /// Drop rows equal in every column to an earlier row, keeping the first
    /// occurrence. Returns how many rows were removed.
    pub fn dedup(&mut self) -> usize {
        let before = self.rows.len();
        let unique: IndexSet<Vec<Cell>> = std::mem::take(&mut self.rows).into_iter().collect();
        self.rows = unique.into_iter().collect();
        before - self.rows.len()
    }

    /// Parse CSV with a header row. Empty fields load as missing cells.
    pub fn read_csv<R: Read>(reader: R) -> IntakeResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Self::new(headers.iter().cloned());
        if table.columns.len() != headers.len() {
            return Err(IntakeError::storage("table header contains duplicate column names"));
        }

        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            if record.len() > headers.len() {
                warn!(row = idx + 2, "dropping cells beyond the header width");
            }
            let cells: Vec<Cell> = (0..headers.len())
                .map(|i| record.get(i).and_then(text_cell))
                .collect();
            table.rows.push(cells);
        }

        Ok(table)
    }

    /// Serialize as CSV with a header row. Missing cells are written empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> IntakeResult<()> {
        let mut writer = csv::Writer::from_writer(writer);
        if self.columns.is_empty() {
            return Ok(());
        }

        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> IntakeResult<Self> {
        let file = fs::File::open(path)
            .map_err(|e| IntakeError::storage(format!("opening {}: {}", path.display(), e)))?;
        Self::read_csv(file)
    }

    /// Write the whole table to `path` via a sibling temporary file, so an
    /// interrupted write never leaves a truncated table behind.
    pub fn save(&self, path: &Path) -> IntakeResult<()> {
        let tmp = temporary_sibling(path);
        {
            let file = fs::File::create(&tmp)
                .map_err(|e| IntakeError::storage(format!("creating {}: {}", tmp.display(), e)))?;
            self.write_csv(file)?;
        }
        fs::rename(&tmp, path).map_err(|e| {
            IntakeError::storage(format!("replacing {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Outcome of merging one batch into one table file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableMergeStats {
    pub created: bool,
    pub existing_rows: usize,
    pub incoming_rows: usize,
    pub duplicates_dropped: usize,
    pub written_rows: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub applications: TableMergeStats,
    pub medications: TableMergeStats,
}

/// Merge `incoming` into the table stored at `path`.
///
/// An existing table is loaded, extended and deduplicated. When no file
/// exists the incoming rows are written as they are.
pub fn merge_table_file(path: &Path, incoming: Table) -> IntakeResult<TableMergeStats> {
    let incoming_rows = incoming.len();

    if !path.exists() {
        incoming.save(path)?;
        debug!(path = %path.display(), rows = incoming_rows, "created table");
        return Ok(TableMergeStats {
            created: true,
            existing_rows: 0,
            incoming_rows,
            duplicates_dropped: 0,
            written_rows: incoming_rows,
        });
    }

    let mut table = Table::load(path)?;
    let existing_rows = table.len();
    table.append(incoming);
    let duplicates_dropped = table.dedup();
    table.save(path)?;

    Ok(TableMergeStats {
        created: false,
        existing_rows,
        incoming_rows,
        duplicates_dropped,
        written_rows: table.len(),
    })
}

/// The two accumulated tables inside one output directory.
#[derive(Debug, Clone)]
pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn applications_path(&self) -> PathBuf {
        self.dir.join(APPLICATIONS_TABLE)
    }

    pub fn medications_path(&self) -> PathBuf {
        self.dir.join(MEDICATIONS_TABLE)
    }

    /// Append one batch of rows to both tables.
    pub fn merge(
        &self,
        applications: &[ApplicationRecord],
        medications: &[MedicationRecord],
    ) -> IntakeResult<MergeReport> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            IntakeError::storage(format!("creating {}: {}", self.dir.display(), e))
        })?;

        let report = MergeReport {
            applications: merge_table_file(
                &self.applications_path(),
                Table::from_records(applications),
            )?,
            medications: merge_table_file(
                &self.medications_path(),
                Table::from_records(medications),
            )?,
        };

        info!(
            applications = report.applications.written_rows,
            medications = report.medications.written_rows,
            duplicates = report.applications.duplicates_dropped + report.medications.duplicates_dropped,
            "tables updated"
        );
        Ok(report)
    }
}

/// Append new rows to the tables kept in `storage`.
pub fn merge(
    applications: &[ApplicationRecord],
    medications: &[MedicationRecord],
    storage: &Path,
) -> IntakeResult<MergeReport> {
    TableStore::new(storage).merge(applications, medications)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| text_cell(v)).collect()
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut table = Table::new(columns.iter().copied());
        for row in rows {
            table.push_row(cells(row)).unwrap();
        }
        table
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut t = table(&["a", "b"], &[&["1", "x"], &["2", "y"], &["1", "x"], &["1", ""]]);
        assert_eq!(t.dedup(), 1);
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(0, "a"), Some("1"));
        assert_eq!(t.get(1, "a"), Some("2"));
        assert_eq!(t.get(2, "b"), None);
    }

    #[test]
    fn test_append_outer_joins_columns() {
        let mut existing = table(&["uid", "old"], &[&["A", "kept"]]);
        let incoming = table(&["uid", "new"], &[&["B", "added"]]);

        existing.append(incoming);

        let columns: Vec<&str> = existing.columns().collect();
        assert_eq!(columns, vec!["uid", "old", "new"]);
        assert_eq!(existing.get(0, "new"), None);
        assert_eq!(existing.get(1, "uid"), Some("B"));
        assert_eq!(existing.get(1, "old"), None);
        assert_eq!(existing.get(1, "new"), Some("added"));
    }

    #[test]
    fn test_push_row_pads_and_rejects_wide_rows() {
        let mut t = Table::new(["a", "b", "c"]);
        t.push_row(cells(&["1"])).unwrap();
        assert_eq!(t.rows()[0].len(), 3);
        assert!(t.push_row(cells(&["1", "2", "3", "4"])).is_err());
    }

    #[test]
    fn test_csv_round_trip_preserves_missing_cells() {
        let original = table(&["a", "b"], &[&["1", ""], &["x,y", "quote\"d"]]);

        let mut buffer = Vec::new();
        original.write_csv(&mut buffer).unwrap();
        let loaded = Table::read_csv(buffer.as_slice()).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_ragged_csv_rows_are_padded() {
        let data = b"a,b,c\n1,2\n3,4,5,6\n";
        let loaded = Table::read_csv(&data[..]).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0, "c"), None);
        assert_eq!(loaded.get(1, "c"), Some("5"));
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        let data = b"a,a\n1,2\n";
        assert!(Table::read_csv(&data[..]).is_err());
    }

    #[test]
    fn test_merge_creates_then_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");

        let first = merge_table_file(&path, table(&["a"], &[&["1"], &["1"]])).unwrap();
        assert!(first.created);
        assert_eq!(first.written_rows, 2);

        let second = merge_table_file(&path, table(&["a"], &[&["1"], &["2"]])).unwrap();
        assert!(!second.created);
        assert_eq!(second.existing_rows, 2);
        assert_eq!(second.duplicates_dropped, 2);
        assert_eq!(second.written_rows, 2);

        let stored = Table::load(&path).unwrap();
        assert_eq!(stored.get(0, "a"), Some("1"));
        assert_eq!(stored.get(1, "a"), Some("2"));
        assert!(!dir.path().join("t.csv.tmp").exists());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        merge_table_file(&path, table(&["a", "b"], &[&["0", "seed"]])).unwrap();

        let batch = table(&["a", "b"], &[&["1", "x"], &["2", ""]]);
        merge_table_file(&path, batch.clone()).unwrap();
        let once = Table::load(&path).unwrap();

        merge_table_file(&path, batch).unwrap();
        let twice = Table::load(&path).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 3);
    }

    #[test]
    fn test_store_writes_both_tables_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path().join("out"));

        let report = store.merge(&[], &[]).unwrap();
        assert!(report.applications.created);
        assert_eq!(report.medications.written_rows, 0);

        let apps = Table::load(&store.applications_path()).unwrap();
        let columns: Vec<&str> = apps.columns().collect();
        assert_eq!(columns, ApplicationRecord::COLUMNS.to_vec());

        let meds = Table::load(&store.medications_path()).unwrap();
        assert_eq!(meds.columns().count(), MedicationRecord::COLUMNS.len());
    }

    #[test]
    fn test_merge_appends_document_rows_to_storage() {
        use crate::records::normalizer::RecordNormalizer;
        use intake_models::ApplicationDocument;
        use serde_json::json;

        let dir = tempfile::tempdir().unwrap();
        let document = ApplicationDocument::from_value(json!({
            "uid": "F7",
            "applicants": [{ "applicant": 0 }, { "applicant": 1 }],
            "phq": { "medications": [{ "applicant": 1, "name": "Metformin" }] }
        }))
        .unwrap();
        let normalized = RecordNormalizer::new().normalize(&document);

        let first = merge(&normalized.applications, &normalized.medications, dir.path()).unwrap();
        assert!(first.applications.created && first.medications.created);
        assert_eq!(first.applications.written_rows, 2);
        assert_eq!(first.medications.written_rows, 1);

        let again = merge(&normalized.applications, &normalized.medications, dir.path()).unwrap();
        assert!(!again.applications.created);
        assert_eq!(again.applications.duplicates_dropped, 2);
        assert_eq!(again.medications.written_rows, 1);

        let apps = Table::load(&dir.path().join(APPLICATIONS_TABLE)).unwrap();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps.get(1, "medications"), Some("Metformin"));
    }
}
