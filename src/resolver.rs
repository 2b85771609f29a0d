//! Turns the configured date window into download units of time:
//! calendar days for sales reports and fiscal periods for financial reports.

use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::{parse_date, Config, Job};
use crate::errors::{ReportError, Result};
use crate::fiscal::{CalendarCache, PeriodId, DATE_MASK};
use crate::models::ReportKind;

/// Fiscal years after the end date's calendar year that may still contain it
const FISCAL_YEARS_AHEAD: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRange {
    Dates(Vec<NaiveDate>),
    Periods(Vec<PeriodId>),
}

impl ResolvedRange {
    pub fn len(&self) -> usize {
        match self {
            ResolvedRange::Dates(dates) => dates.len(),
            ResolvedRange::Periods(periods) => periods.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every date in `[start, end]`, one per day
pub fn resolve_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// [`resolve_dates`] over `YYYYMMDD` strings
pub fn resolve_date_keys(start: &str, end: &str) -> Result<Vec<String>> {
    let start = parse_date(start, "startDate")?;
    let end = parse_date(end, "endDate")?;
    Ok(resolve_dates(start, end)
        .into_iter()
        .map(|day| day.format(DATE_MASK).to_string())
        .collect())
}

/// Fiscal periods touched by a date window, plus the dates no period contains.
///
/// Consecutive fiscal years do not always chain: some years end a week before
/// the next one starts, so dates in that week belong to no period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodCoverage {
    pub periods: Vec<PeriodId>,
    pub uncovered: Vec<NaiveDate>,
}

/// Map every date in `[start, end]` onto its fiscal periods
pub fn cover_periods(start: NaiveDate, end: NaiveDate, cache: &mut CalendarCache) -> PeriodCoverage {
    let years = start.year()..=end.year() + FISCAL_YEARS_AHEAD;
    let mut seen = HashSet::new();
    let mut coverage = PeriodCoverage::default();

    for day in resolve_dates(start, end) {
        let mut matched = false;
        for year in years.clone() {
            if let Some(id) = cache.get(year).period_of(day) {
                matched = true;
                if seen.insert(id) {
                    coverage.periods.push(id);
                }
            }
        }
        if !matched {
            coverage.uncovered.push(day);
        }
    }

    debug!(
        "Resolved {} fiscal periods from {} calendars",
        coverage.periods.len(),
        cache.len()
    );
    coverage
}

/// Period identifiers covering `[start, end]`, deduplicated in chronological order.
///
/// Dates falling between two fiscal years are logged and skipped.
pub fn resolve_periods(start: NaiveDate, end: NaiveDate, cache: &mut CalendarCache) -> Vec<PeriodId> {
    let coverage = cover_periods(start, end, cache);

    if !coverage.uncovered.is_empty() {
        let days: Vec<String> = coverage
            .uncovered
            .iter()
            .map(|day| day.format(DATE_MASK).to_string())
            .collect();
        warn!(
            "{} dates fall between fiscal years and match no period: {}",
            days.len(),
            days.join(", ")
        );
    }

    coverage.periods
}

/// Resolve the job's date window for its report kind
pub fn resolve(job: &Job, config: &Config) -> Result<ResolvedRange> {
    match job.kind {
        ReportKind::Sales => {
            let dates = resolve_dates(job.start_date, job.end_date);
            if dates.len() > config.max_interval_days {
                return Err(ReportError::validation(format!(
                    "Requested {} days of sales reports, the maximum interval is {} days",
                    dates.len(),
                    config.max_interval_days
                )));
            }
            Ok(ResolvedRange::Dates(dates))
        }
        ReportKind::Financial => {
            let mut cache = CalendarCache::new(job.fiscal_start_month);
            Ok(ResolvedRange::Periods(resolve_periods(
                job.start_date,
                job.end_date,
                &mut cache,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn job(kind: ReportKind, start: NaiveDate, end: NaiveDate) -> Job {
        Job {
            credentials: Credentials {
                user_id: "user".to_string(),
                password: "secret".to_string(),
            },
            kind,
            vendors: vec!["123".to_string()],
            regions: vec!["US".to_string()],
            start_date: start,
            end_date: end,
            primary_keys: Vec::new(),
            fiscal_start_month: 10,
            output_file: "out.csv".to_string(),
        }
    }

    #[test]
    fn test_resolve_date_keys_inclusive() {
        assert_eq!(
            resolve_date_keys("20200101", "20200103").unwrap(),
            vec!["20200101", "20200102", "20200103"]
        );
    }

    #[test]
    fn test_resolve_dates_across_month_end() {
        let dates = resolve_dates(date(2020, 2, 28), date(2020, 3, 1));
        assert_eq!(dates, vec![date(2020, 2, 28), date(2020, 2, 29), date(2020, 3, 1)]);
    }

    #[test]
    fn test_periods_within_one_period() {
        let mut cache = CalendarCache::new(10);
        // FY2020 period 3 runs from 2019-12-29 to 2020-02-01
        let periods = resolve_periods(date(2020, 1, 1), date(2020, 1, 31), &mut cache);
        assert_eq!(periods, vec![PeriodId::new(2020, 3)]);
    }

    #[test]
    fn test_periods_across_fiscal_year_boundary() {
        let mut cache = CalendarCache::new(10);
        let periods = resolve_periods(date(2019, 9, 20), date(2019, 10, 5), &mut cache);
        assert_eq!(periods, vec![PeriodId::new(2019, 11), PeriodId::new(2020, 0)]);
    }

    #[test]
    fn test_dates_between_fiscal_years_are_reported() {
        let mut cache = CalendarCache::new(10);
        // FY2028 ends on 2028-09-23 and FY2029 starts on 2028-10-01
        assert_eq!(cache.get(2028).last_day(), date(2028, 9, 23));
        assert_eq!(cache.get(2029).first_day(), date(2028, 10, 1));

        let coverage = cover_periods(date(2028, 9, 20), date(2028, 10, 2), &mut cache);
        assert_eq!(coverage.periods, vec![PeriodId::new(2028, 11), PeriodId::new(2029, 0)]);
        assert_eq!(
            coverage.uncovered,
            resolve_dates(date(2028, 9, 24), date(2028, 9, 30))
        );

        let gap_only = resolve_periods(date(2028, 9, 24), date(2028, 9, 30), &mut cache);
        assert!(gap_only.is_empty());
    }

    #[test]
    fn test_every_date_is_covered_or_reported() {
        let mut cache = CalendarCache::new(10);
        let mut gap_days = 0;

        for year in 1995..=2065 {
            let start = date(year, 1, 1);
            let end = date(year, 12, 31);
            let coverage = cover_periods(start, end, &mut cache);

            for day in resolve_dates(start, end) {
                let in_some_year = (year..=year + 1).any(|fy| cache.get(fy).period_of(day).is_some());
                assert_eq!(
                    in_some_year,
                    !coverage.uncovered.contains(&day),
                    "{} is neither covered nor reported",
                    day
                );
                if in_some_year {
                    let id = (year..=year + 1)
                        .find_map(|fy| cache.get(fy).period_of(day))
                        .unwrap();
                    assert!(coverage.periods.contains(&id), "{} missing for {}", id, day);
                }
            }
            gap_days += coverage.uncovered.len();
        }

        // One lost week after FY2000, FY2017, FY2028, FY2045, FY2056 and FY2062
        assert_eq!(gap_days, 6 * 7);
    }

    #[test]
    fn test_sales_interval_limit() {
        let config = Config {
            max_interval_days: 2,
            ..Config::default()
        };
        let err = resolve(
            &job(ReportKind::Sales, date(2020, 1, 1), date(2020, 1, 3)),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::Validation(_)));

        let ok = resolve(
            &job(ReportKind::Sales, date(2020, 1, 1), date(2020, 1, 2)),
            &config,
        )
        .unwrap();
        assert_eq!(ok.len(), 2);
    }

    #[test]
    fn test_financial_resolves_periods() {
        let range = resolve(
            &job(ReportKind::Financial, date(2020, 1, 1), date(2020, 3, 1)),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(
            range,
            ResolvedRange::Periods(vec![
                PeriodId::new(2020, 3),
                PeriodId::new(2020, 4),
                PeriodId::new(2020, 5),
            ])
        );
    }
}
