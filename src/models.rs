use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::ReportError;
use crate::fiscal::PeriodId;

/// Fixed request shape for sales reports
pub const SALES_REPORT_SUB_TYPE: &str = "Summary";
pub const SALES_DATE_TYPE: &str = "Daily";

/// Region codes requested for financial reports unless configured otherwise
pub const FINANCE_REGIONS: [&str; 24] = [
    "AE", "AU", "CA", "CH", "DK", "EU", "GB", "HK", "ID", "IL", "IN", "JP", "MX", "NO", "NZ",
    "RU", "SA", "SE", "SG", "TR", "TW", "US", "WW", "ZA",
];

pub const COMPRESSED_EXTENSION: &str = "gz";
pub const DATA_EXTENSION: &str = "csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Sales,
    Financial,
}

impl ReportKind {
    pub fn as_str(&self) -> &str {
        match self {
            ReportKind::Sales => "sales",
            ReportKind::Financial => "financial",
        }
    }

    /// Report type as named in service requests
    pub fn request_type(&self) -> &str {
        match self {
            ReportKind::Sales => "Sales",
            ReportKind::Financial => "Financial",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Ok(ReportKind::Sales),
            "financial" => Ok(ReportKind::Financial),
            other => Err(ReportError::validation(format!(
                "Parameter reportType has invalid value '{}'. Please specify either sales or financial",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesParams {
    pub vendor_number: String,
    pub report_type: String,
    pub report_sub_type: String,
    pub date_type: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialParams {
    pub vendor_number: String,
    pub report_type: String,
    pub region_code: String,
    pub fiscal_year: i32,
    pub fiscal_period: u32,
    #[serde(skip)]
    pub period_id: PeriodId,
}

/// One report request worth of parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadUnit {
    Sales(SalesParams),
    Financial(FinancialParams),
}

impl DownloadUnit {
    pub fn kind(&self) -> ReportKind {
        match self {
            DownloadUnit::Sales(_) => ReportKind::Sales,
            DownloadUnit::Financial(_) => ReportKind::Financial,
        }
    }

    /// Name of the decompressed data file, unique across the units of one run
    pub fn logical_name(&self) -> String {
        match self {
            DownloadUnit::Sales(params) => {
                format!("{}_{}.{}", params.vendor_number, params.date, DATA_EXTENSION)
            }
            DownloadUnit::Financial(params) => format!(
                "{}_{}_{}_{:02}.{}",
                params.vendor_number,
                params.region_code,
                params.fiscal_year,
                params.fiscal_period,
                DATA_EXTENSION
            ),
        }
    }

    pub fn compressed_name(&self) -> String {
        format!("{}.{}", self.logical_name(), COMPRESSED_EXTENSION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Downloaded,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub state: FetchState,
    pub compressed_path: PathBuf,
    pub raw_path: PathBuf,
    pub logical_name: String,
}

impl FetchResult {
    pub fn is_downloaded(&self) -> bool {
        self.state == FetchState::Downloaded
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompressOutcome {
    /// Raw tab-delimited file ready for transformation
    Decompressed(PathBuf),
    /// Zero-length or corrupt archive, treated as no data
    Empty,
}
