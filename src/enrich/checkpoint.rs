use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::product::{write_catalog, CatalogRow};

/// Progress marker persisted next to each table snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// First table index not yet processed.
    pub next_index: usize,
    /// Rows processed in the run that wrote this record.
    pub processed: usize,
    pub total_rows: usize,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn new(next_index: usize, processed: usize, total_rows: usize) -> Self {
        Self {
            next_index,
            processed,
            total_rows,
            updated_at: Utc::now(),
        }
    }

    /// Offset to resume from, provided the record describes a table of the
    /// same size.
    pub fn resume_offset(&self, total_rows: usize) -> Option<usize> {
        (self.total_rows == total_rows && self.next_index <= total_rows).then_some(self.next_index)
    }
}

/// Where full-table snapshots go.
pub trait SnapshotSink {
    fn persist(&mut self, rows: &[CatalogRow], record: &CheckpointRecord) -> Result<()>;
}

/// Writes the table CSV and a JSON checkpoint record beside it.
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    table_path: PathBuf,
    record_path: PathBuf,
    written: usize,
}

impl FileSnapshotSink {
    pub fn new(table_path: impl Into<PathBuf>) -> Self {
        let table_path = table_path.into();
        let record_path = record_path_for(&table_path);
        Self {
            table_path,
            record_path,
            written: 0,
        }
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn persist(&mut self, rows: &[CatalogRow], record: &CheckpointRecord) -> Result<()> {
        write_catalog(&self.table_path, rows)?;
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&self.record_path, json)
            .with_context(|| format!("failed to write {}", self.record_path.display()))?;
        self.written += 1;
        info!(
            processed = record.processed,
            next_index = record.next_index,
            path = %self.table_path.display(),
            "progress saved"
        );
        Ok(())
    }
}

/// `inventario.csv` → `inventario.checkpoint.json`
pub fn record_path_for(table_path: &Path) -> PathBuf {
    table_path.with_extension("checkpoint.json")
}

/// Read a checkpoint record; a missing or unreadable record is `None`.
pub fn load_record(path: &Path) -> Option<CheckpointRecord> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(rec) => Some(rec),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable checkpoint record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sits_next_to_table() {
        assert_eq!(
            record_path_for(Path::new("out/inventario_actualizado.csv")),
            PathBuf::from("out/inventario_actualizado.checkpoint.json")
        );
    }

    #[test]
    fn resume_offset_requires_matching_table() {
        let rec = CheckpointRecord::new(20, 20, 25);
        assert_eq!(rec.resume_offset(25), Some(20));
        assert_eq!(rec.resume_offset(30), None);
        assert_eq!(CheckpointRecord::new(25, 5, 25).resume_offset(25), Some(25));
    }

    #[test]
    fn persists_table_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSnapshotSink::new(dir.path().join("inv.csv"));
        sink.persist(&[], &CheckpointRecord::new(10, 10, 40)).unwrap();
        assert!(sink.table_path().exists());
        let rec = load_record(sink.record_path()).unwrap();
        assert_eq!(rec.next_index, 10);
        assert_eq!(rec.total_rows, 40);
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn garbage_record_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.checkpoint.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_record(&path).is_none());
        assert!(load_record(&dir.path().join("missing.json")).is_none());
    }
}
