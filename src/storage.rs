use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::errors::{ReportError, Result};

pub const MANIFEST_EXTENSION: &str = "manifest";
pub const ID_COLUMN: &str = "id";

/// Destination CSV table shared by every file of a run.
///
/// The header row is written only when the file does not exist yet; later
/// files append data rows and must produce the same header.
#[derive(Debug, Clone)]
pub struct OutputTable {
    path: PathBuf,
}

impl OutputTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    /// Header of the existing table, if there is one
    pub fn existing_header(&self) -> Result<Option<Vec<String>>> {
        if !self.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let header = reader.headers()?.iter().map(|h| h.to_string()).collect();
        Ok(Some(header))
    }

    /// Open the table for appending rows under `header`
    pub fn open_append(&self, header: &[String], source_name: &str) -> Result<TableWriter> {
        let existing = self.existing_header()?;

        if let Some(existing) = &existing {
            if existing.as_slice() != header {
                return Err(ReportError::transform(
                    source_name,
                    format!(
                        "columns {:?} do not match existing table {} columns {:?}",
                        header,
                        self.path.display(),
                        existing
                    ),
                ));
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));

        if existing.is_none() {
            debug!("Writing header to new table {}", self.path.display());
            writer.write_record(header)?;
        }

        Ok(TableWriter {
            writer,
            rows_written: 0,
        })
    }
}

/// Appending writer for one source file
pub struct TableWriter {
    writer: Writer<BufWriter<File>>,
    rows_written: usize,
}

impl TableWriter {
    pub fn write_row(&mut self, row: &[String]) -> Result<()> {
        self.writer.write_record(row)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush buffered rows and return how many were written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }
}

/// Sidecar metadata describing how the table is loaded downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub incremental: bool,
    pub primary_key: Vec<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            incremental: true,
            primary_key: vec![ID_COLUMN.to_string()],
        }
    }
}

pub fn manifest_path(table_path: &Path) -> PathBuf {
    let mut name = table_path.as_os_str().to_os_string();
    name.push(".");
    name.push(MANIFEST_EXTENSION);
    PathBuf::from(name)
}

/// Write `<table>.manifest` next to the table
pub fn write_manifest(table_path: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = manifest_path(table_path);
    let content = serde_json::to_string(manifest)?;
    std::fs::write(&path, content)?;
    info!("Wrote manifest {}", path.display());
    Ok(path)
}

/// Temporary directory for compressed and raw files, removed when dropped
pub fn create_staging_dir() -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix("report-extractor-")
        .tempdir()?;
    debug!("Staging directory: {}", dir.path().display());
    Ok(dir)
}
