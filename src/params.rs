//! Request parameter builder: crosses vendors with dates (sales) or with
//! periods and regions (financial), one [`DownloadUnit`] per combination.

use chrono::NaiveDate;

use crate::config::Job;
use crate::fiscal::{PeriodId, DATE_MASK};
use crate::models::{
    DownloadUnit, FinancialParams, ReportKind, SalesParams, SALES_DATE_TYPE,
    SALES_REPORT_SUB_TYPE,
};
use crate::resolver::ResolvedRange;

/// One sales unit per vendor and date, dates outermost
pub fn sales_units(vendors: &[String], dates: &[NaiveDate]) -> Vec<DownloadUnit> {
    dates
        .iter()
        .flat_map(|date| {
            let date = date.format(DATE_MASK).to_string();
            vendors.iter().map(move |vendor| {
                DownloadUnit::Sales(SalesParams {
                    vendor_number: vendor.clone(),
                    report_type: ReportKind::Sales.request_type().to_string(),
                    report_sub_type: SALES_REPORT_SUB_TYPE.to_string(),
                    date_type: SALES_DATE_TYPE.to_string(),
                    date: date.clone(),
                })
            })
        })
        .collect()
}

/// One financial unit per period, vendor and region, in that nesting order
pub fn financial_units(
    vendors: &[String],
    regions: &[String],
    periods: &[PeriodId],
) -> Vec<DownloadUnit> {
    let mut units = Vec::with_capacity(periods.len() * vendors.len() * regions.len());

    for period in periods {
        let fiscal = period.align();
        for vendor in vendors {
            for region in regions {
                units.push(DownloadUnit::Financial(FinancialParams {
                    vendor_number: vendor.clone(),
                    report_type: ReportKind::Financial.request_type().to_string(),
                    region_code: region.clone(),
                    fiscal_year: fiscal.year,
                    fiscal_period: fiscal.period,
                    period_id: *period,
                }));
            }
        }
    }

    units
}

/// Build every download unit for a job and its resolved range
pub fn build_units(job: &Job, range: &ResolvedRange) -> Vec<DownloadUnit> {
    match range {
        ResolvedRange::Dates(dates) => sales_units(&job.vendors, dates),
        ResolvedRange::Periods(periods) => financial_units(&job.vendors, &job.regions, periods),
    }
}
