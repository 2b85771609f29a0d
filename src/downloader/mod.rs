//! Report fetching and decompression
//!
//! Every download unit is fetched independently, up to `concurrency` at a time.
//! A stage always waits for all of its units to settle before reporting the
//! first fatal error it observed, so no unit is left with an open file.

use futures::stream::{self, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::errors::{ReportError, Result};
use crate::models::{DecompressOutcome, DownloadUnit, FetchResult, FetchState};

pub mod archive;
pub mod client;

pub use archive::{decompress_report, is_data_file};
pub use client::{HttpReportService, ReportService};

/// Header the report service sets when there is no report for the request
pub const EXIT_CODE_HEADER: &str = "exitcode";

/// How a report response is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Downloaded,
    Empty,
    Unexpected(u16),
}

/// Classify a response by status code and the no-data header
pub fn classify_response(status: StatusCode, headers: &HeaderMap) -> ResponseClass {
    let no_report = headers
        .get(EXIT_CODE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim() == "1")
        .unwrap_or(false);

    if no_report {
        return ResponseClass::Empty;
    }

    match status {
        StatusCode::OK => ResponseClass::Downloaded,
        StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => ResponseClass::Empty,
        other => ResponseClass::Unexpected(other.as_u16()),
    }
}

/// Whether a transport failure is a DNS, connect, reset or timeout problem
pub fn is_connectivity_error(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        let message = cause.to_string().to_lowercase();
        if message.contains("dns error") || message.contains("connection reset") {
            return true;
        }
        source = cause.source();
    }

    false
}

fn transport_error(err: reqwest::Error, file_name: &str) -> ReportError {
    if is_connectivity_error(&err) {
        ReportError::Connectivity {
            file_name: file_name.to_string(),
            message: err.to_string(),
        }
    } else {
        ReportError::Http(err)
    }
}

/// Issue one request and stream a downloaded report into the staging directory
pub async fn fetch_report(
    service: &dyn ReportService,
    unit: &DownloadUnit,
    staging_dir: &Path,
) -> Result<FetchResult> {
    let logical_name = unit.logical_name();
    let compressed_path = staging_dir.join(unit.compressed_name());
    let raw_path = staging_dir.join(&logical_name);

    let response = service
        .get_report(unit)
        .await
        .map_err(|e| transport_error(e, &logical_name))?;

    let state = match classify_response(response.status(), response.headers()) {
        ResponseClass::Downloaded => {
            let mut file = tokio::fs::File::create(&compressed_path).await?;
            let mut body = response.bytes_stream();
            let mut written = 0usize;

            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| transport_error(e, &logical_name))?;
                file.write_all(&chunk).await?;
                written += chunk.len();
            }
            file.flush().await?;

            debug!("Downloaded {} bytes into {}", written, compressed_path.display());
            FetchState::Downloaded
        }
        ResponseClass::Empty => {
            info!("No report available for {}", logical_name);
            FetchState::Empty
        }
        ResponseClass::Unexpected(status) => {
            return Err(ReportError::Transfer {
                status,
                file_name: logical_name,
            });
        }
    };

    Ok(FetchResult {
        state,
        compressed_path,
        raw_path,
        logical_name,
    })
}

/// Outcome of fetching every unit of a run
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Downloaded reports, in unit order
    pub downloaded: Vec<FetchResult>,
    /// Logical names of units without data
    pub empty: Vec<String>,
}

/// Fetch all units with at most `concurrency` requests in flight
pub async fn fetch_all(
    service: &dyn ReportService,
    units: &[DownloadUnit],
    staging_dir: &Path,
    concurrency: usize,
) -> Result<FetchReport> {
    let settled: Vec<(usize, Result<FetchResult>)> = stream::iter(units.iter().enumerate())
        .map(|(index, unit)| async move { (index, fetch_report(service, unit, staging_dir).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let (mut fetched, first_error) = settle(settled, "fetch");
    if let Some(err) = first_error {
        return Err(err);
    }

    fetched.sort_by_key(|(index, _)| *index);
    let mut report = FetchReport::default();
    for (_, result) in fetched {
        match result.state {
            FetchState::Downloaded => report.downloaded.push(result),
            FetchState::Empty => report.empty.push(result.logical_name),
        }
    }

    info!(
        "Fetched {} units: {} downloaded, {} empty",
        units.len(),
        report.downloaded.len(),
        report.empty.len()
    );
    Ok(report)
}

/// Outcome of decompressing every downloaded report
#[derive(Debug, Default)]
pub struct DecompressReport {
    /// Raw data files, in unit order
    pub files: Vec<PathBuf>,
    /// Logical names of archives that held no data
    pub empty: Vec<String>,
}

/// Decompress downloaded reports with at most `concurrency` running at once
pub async fn decompress_all(results: &[FetchResult], concurrency: usize) -> Result<DecompressReport> {
    let settled: Vec<(usize, Result<(String, DecompressOutcome)>)> =
        stream::iter(results.iter().filter(|r| r.is_downloaded()).enumerate())
            .map(|(index, result)| {
                let compressed = result.compressed_path.clone();
                let raw = result.raw_path.clone();
                let name = result.logical_name.clone();
                async move {
                    let outcome = tokio::task::spawn_blocking(move || {
                        decompress_report(&compressed, &raw).map(|outcome| (name, outcome))
                    })
                    .await
                    .map_err(ReportError::from)
                    .and_then(|inner| inner);
                    (index, outcome)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let (mut decompressed, first_error) = settle(settled, "decompress");
    if let Some(err) = first_error {
        return Err(err);
    }

    decompressed.sort_by_key(|(index, _)| *index);
    let mut report = DecompressReport::default();
    for (_, (name, outcome)) in decompressed {
        match outcome {
            DecompressOutcome::Decompressed(path) if is_data_file(&path) => report.files.push(path),
            DecompressOutcome::Decompressed(path) => {
                debug!("Skipping non-data file {}", path.display());
            }
            DecompressOutcome::Empty => {
                info!("Report {} is empty", name);
                report.empty.push(name);
            }
        }
    }

    Ok(report)
}

/// Split settled results into successes and the first error, logging every failure
fn settle<T>(settled: Vec<(usize, Result<T>)>, stage: &str) -> (Vec<(usize, T)>, Option<ReportError>) {
    let mut successes = Vec::with_capacity(settled.len());
    let mut first_error = None;
    let mut failures = 0usize;

    for (index, result) in settled {
        match result {
            Ok(value) => successes.push((index, value)),
            Err(e) => {
                failures += 1;
                error!("{} failed for unit {}: {}", stage, index, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if failures > 0 {
        error!("{} of {} units failed during {}", failures, failures + successes.len(), stage);
    }
    (successes, first_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(exit_code: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(code) = exit_code {
            headers.insert(EXIT_CODE_HEADER, HeaderValue::from_str(code).unwrap());
        }
        headers
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            classify_response(StatusCode::OK, &headers(None)),
            ResponseClass::Downloaded
        );
        assert_eq!(
            classify_response(StatusCode::NOT_FOUND, &headers(None)),
            ResponseClass::Empty
        );
        assert_eq!(
            classify_response(StatusCode::UNAUTHORIZED, &headers(None)),
            ResponseClass::Empty
        );
        assert_eq!(
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, &headers(None)),
            ResponseClass::Unexpected(500)
        );
        assert_eq!(
            classify_response(StatusCode::FORBIDDEN, &headers(None)),
            ResponseClass::Unexpected(403)
        );
    }

    #[test]
    fn test_exit_code_header_means_no_data() {
        assert_eq!(
            classify_response(StatusCode::OK, &headers(Some("1"))),
            ResponseClass::Empty
        );
        assert_eq!(
            classify_response(StatusCode::BAD_REQUEST, &headers(Some("1"))),
            ResponseClass::Empty
        );
        assert_eq!(
            classify_response(StatusCode::OK, &headers(Some("0"))),
            ResponseClass::Downloaded
        );
    }

    #[test]
    fn test_settle_keeps_first_error() {
        let settled: Vec<(usize, Result<u8>)> = vec![
            (2, Ok(1)),
            (0, Err(ReportError::Transfer { status: 500, file_name: "a".to_string() })),
            (1, Err(ReportError::Transfer { status: 502, file_name: "b".to_string() })),
        ];
        let (ok, err) = settle(settled, "fetch");
        assert_eq!(ok.len(), 1);
        assert!(matches!(err, Some(ReportError::Transfer { status: 500, .. })));
    }
}
