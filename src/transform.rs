//! Dedup/key transformation of raw tab-delimited reports
//!
//! Every row gets a synthetic `id`: the MD5 digest of a counter followed by the
//! row's primary key values. Headers are rewritten to camel case and values
//! trimmed before rows are appended to the run's output table.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::{ReportError, Result};
use crate::models::ReportKind;
use crate::storage::{OutputTable, ID_COLUMN};

/// Normalized name of the column holding vendor subtotal markers
pub const START_DATE_COLUMN: &str = "startDate";
const SUBTOTAL_MARKER: &str = "Total";

/// How row ids are seeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Counter reset per file, followed by the listed column values
    Columns(Vec<String>),
    /// Counter running across every file of the run
    Ordinal,
}

impl KeyStrategy {
    pub fn from_columns(columns: &[String]) -> Self {
        if columns.is_empty() {
            KeyStrategy::Ordinal
        } else {
            KeyStrategy::Columns(columns.to_vec())
        }
    }
}

/// Rewrite a source header as a lower camel case identifier.
///
/// Words are split on any non-alphanumeric character and on case humps,
/// so `Start Date`, `start_date` and `StartDate` all become `startDate`.
pub fn camel_case(header: &str) -> String {
    let mut out = String::with_capacity(header.len());

    for (position, word) in split_words(header).iter().enumerate() {
        let lower = word.to_lowercase();
        if position == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }

    out
}

fn split_words(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if !current.is_empty() && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let hump = prev.is_lowercase() || prev.is_numeric();
            let acronym_end = prev.is_uppercase() && next_is_lower;
            if hump || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// MD5 hex digest of `counter` followed by each key value, space separated
pub fn generate_primary_key(counter: u64, key_values: &[&str]) -> String {
    let mut seed = counter.to_string();
    for value in key_values {
        seed.push(' ');
        seed.push_str(value);
    }
    format!("{:x}", md5::compute(seed.as_bytes()))
}

/// Vendor subtotal rows only appear in financial reports
pub fn is_subtotal_row(kind: ReportKind, start_date: &str) -> bool {
    kind == ReportKind::Financial && start_date.contains(SUBTOTAL_MARKER)
}

/// Row counts for one transformed file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub rows_written: usize,
    pub subtotals_dropped: usize,
    /// Rows with more fields than the header; the extra fields are discarded
    pub truncated_rows: usize,
}

/// Appends raw report files to one output table, keying every row
#[derive(Debug)]
pub struct KeyTransformer {
    kind: ReportKind,
    strategy: KeyStrategy,
    run_counter: u64,
}

impl KeyTransformer {
    pub fn new(kind: ReportKind, primary_keys: &[String]) -> Self {
        Self {
            kind,
            strategy: KeyStrategy::from_columns(primary_keys),
            run_counter: 0,
        }
    }

    pub fn strategy(&self) -> &KeyStrategy {
        &self.strategy
    }

    /// Transform one raw file into `table`
    pub fn transform_file(&mut self, source: &Path, table: &OutputTable) -> Result<FileStats> {
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let fail = |message: String| ReportError::transform(file_name.clone(), message);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .has_headers(true)
            .from_path(source)
            .map_err(|e| fail(e.to_string()))?;

        let raw_headers: Vec<String> = reader
            .byte_headers()
            .map_err(|e| fail(e.to_string()))?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        if raw_headers.iter().all(|h| h.is_empty()) {
            debug!("{} has no header row, skipping", file_name);
            return Ok(FileStats::default());
        }

        let columns: Vec<String> = raw_headers.iter().map(|h| camel_case(h)).collect();

        let start_date_index = match self.kind {
            ReportKind::Financial => Some(
                columns
                    .iter()
                    .position(|c| c == START_DATE_COLUMN)
                    .ok_or_else(|| fail("missing Start Date column".to_string()))?,
            ),
            ReportKind::Sales => None,
        };

        let key_indices = match &self.strategy {
            KeyStrategy::Columns(keys) => keys
                .iter()
                .map(|key| {
                    let normalized = camel_case(key);
                    raw_headers
                        .iter()
                        .zip(&columns)
                        .position(|(raw, column)| raw == key || *column == normalized)
                        .ok_or_else(|| fail(format!("primary key column '{}' not found", key)))
                })
                .collect::<Result<Vec<usize>>>()?,
            KeyStrategy::Ordinal => Vec::new(),
        };

        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(ID_COLUMN.to_string());
        header.extend(columns.iter().cloned());

        let mut writer = table.open_append(&header, &file_name)?;
        let mut file_counter = 0u64;
        let mut stats = FileStats::default();
        let mut first_truncated_line = None;

        for record in reader.byte_records() {
            let record = record.map_err(|e| fail(e.to_string()))?;
            if record.len() > columns.len() {
                stats.truncated_rows += 1;
                if first_truncated_line.is_none() {
                    first_truncated_line = record.position().map(|p| p.line());
                }
            }
            let values: Vec<String> = (0..columns.len())
                .map(|i| {
                    record
                        .get(i)
                        .map(|v| String::from_utf8_lossy(v).trim().to_string())
                        .unwrap_or_default()
                })
                .collect();

            if let Some(index) = start_date_index {
                if is_subtotal_row(self.kind, &values[index]) {
                    stats.subtotals_dropped += 1;
                    continue;
                }
            }

            let id = match &self.strategy {
                KeyStrategy::Columns(_) => {
                    file_counter += 1;
                    let key_values: Vec<&str> =
                        key_indices.iter().map(|i| values[*i].as_str()).collect();
                    generate_primary_key(file_counter, &key_values)
                }
                KeyStrategy::Ordinal => {
                    self.run_counter += 1;
                    generate_primary_key(self.run_counter, &[])
                }
            };

            let mut row = Vec::with_capacity(values.len() + 1);
            row.push(id);
            row.extend(values);
            writer.write_row(&row)?;
        }

        stats.rows_written = writer.finish()?;
        if stats.truncated_rows > 0 {
            warn!(
                "{}: {} rows have more fields than the {} header columns, extra fields dropped (first at line {})",
                file_name,
                stats.truncated_rows,
                columns.len(),
                first_truncated_line.map_or_else(|| "?".to_string(), |line| line.to_string())
            );
        }
        info!(
            "Transformed {}: {} rows written, {} subtotal rows dropped, {} rows truncated",
            file_name, stats.rows_written, stats.subtotals_dropped, stats.truncated_rows
        );
        Ok(stats)
    }
}
