//! Sales and financial report extraction.
//!
//! Resolves a date window into report requests (calendar days for sales,
//! 5-4-4 fiscal periods for financial reports), downloads and decompresses the
//! reports, and appends them to one keyed CSV table per run.

pub mod cli;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod fiscal;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod resolver;
pub mod storage;
pub mod transform;

pub use errors::{ReportError, Result};
