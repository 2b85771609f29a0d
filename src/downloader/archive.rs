//! Gzip report archives
//!
//! The report service sometimes answers with a zero-byte or truncated archive
//! instead of a proper "no data" status. Those archives decode as an empty
//! dataset; every other failure is fatal.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::{ReportError, Result};
use crate::models::{DecompressOutcome, DATA_EXTENSION};

const CHUNK_SIZE: usize = 64 * 1024;

/// Errors a corrupt or truncated gzip stream surfaces as
fn is_bad_data(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::UnexpectedEof
    )
}

/// Whether a decompressed file carries the data file suffix
pub fn is_data_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DATA_EXTENSION))
        .unwrap_or(false)
}

/// Decompress `compressed` into `raw`.
pub fn decompress_report(compressed: &Path, raw: &Path) -> Result<DecompressOutcome> {
    let file_name = raw
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    if std::fs::metadata(compressed)?.len() == 0 {
        debug!("Archive {} is empty", compressed.display());
        return Ok(DecompressOutcome::Empty);
    }

    let mut decoder = GzDecoder::new(BufReader::new(File::open(compressed)?));
    let mut writer = BufWriter::new(File::create(raw)?);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0usize;

    loop {
        let read = match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_bad_data(e.kind()) => {
                warn!("Archive {} holds no readable data: {}", compressed.display(), e);
                drop(writer);
                remove_partial(raw);
                return Ok(DecompressOutcome::Empty);
            }
            Err(e) => {
                drop(writer);
                remove_partial(raw);
                return Err(ReportError::Decode {
                    file_name,
                    source: e,
                });
            }
        };

        writer.write_all(&buffer[..read])?;
        total += read;
    }

    writer.flush()?;
    debug!("Decompressed {} bytes into {}", total, raw.display());
    Ok(DecompressOutcome::Decompressed(raw.to_path_buf()))
}

fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}
