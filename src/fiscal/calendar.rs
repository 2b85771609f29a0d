//! 5-4-4 retail fiscal calendar
//!
//! A fiscal year is split into four quarters of three periods. The first period
//! of every quarter spans five weeks and the other two span four, except that
//! the third period of the first quarter gains a fifth week in a leap fiscal
//! year. Fiscal year `Y` starts in the calendar year `Y - 1`.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashMap;

use super::period::PeriodId;

/// Calendar month (1-12) the fiscal year is keyed on when nothing else is configured.
pub const DEFAULT_FISCAL_START_MONTH: u32 = 10;

pub const PERIODS_PER_YEAR: usize = 12;
const QUARTERS: usize = 4;
const PERIODS_PER_QUARTER: usize = 3;
const DAYS_PER_WEEK: i64 = 7;

/// Date mask used by the report service and in period date lists.
pub const DATE_MASK: &str = "%Y%m%d";

/// Settings for generating one fiscal year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalSettings {
    pub year: i32,
    /// Calendar month (1-12)
    pub month: u32,
}

impl FiscalSettings {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

/// One fiscal period: four or five full weeks of consecutive dates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalPeriod {
    pub id: PeriodId,
    pub weeks: usize,
    pub dates: Vec<NaiveDate>,
}

impl FiscalPeriod {
    pub fn first_day(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_day(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day() && date <= self.last_day()
    }

    /// Dates formatted with [`DATE_MASK`]
    pub fn date_keys(&self) -> Vec<String> {
        self.dates
            .iter()
            .map(|date| date.format(DATE_MASK).to_string())
            .collect()
    }
}

/// All twelve periods of a fiscal year, in chronological order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalCalendar {
    pub year: i32,
    pub periods: Vec<FiscalPeriod>,
}

impl FiscalCalendar {
    pub fn is_leap(&self) -> bool {
        is_leap_fiscal_year(self.year)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.periods[0].first_day()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.periods[self.periods.len() - 1].last_day()
    }

    pub fn total_days(&self) -> usize {
        self.periods.iter().map(|period| period.dates.len()).sum()
    }

    /// Period identifier of the period containing `date`, if it falls in this year
    pub fn period_of(&self, date: NaiveDate) -> Option<PeriodId> {
        self.periods
            .iter()
            .find(|period| period.contains(date))
            .map(|period| period.id)
    }
}

/// Number of calendar days in `month` (1-12) of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// 52/53-week leap rule. Unrelated to the Gregorian leap year.
pub fn is_leap_fiscal_year(year: i32) -> bool {
    (52 * (i64::from(year) + 3) + 146).rem_euclid(293) < 52
}

/// Advance a weekly anchor by one week.
pub fn build_week(anchor: NaiveDate) -> NaiveDate {
    anchor + Duration::days(DAYS_PER_WEEK)
}

/// `week_count` consecutive weekly anchors following `anchor`.
///
/// Each returned anchor closes the week that began seven days before it.
pub fn fiscal_weeks(anchor: NaiveDate, week_count: usize) -> Vec<NaiveDate> {
    let mut weeks = Vec::with_capacity(week_count);
    let mut week = anchor;

    for _ in 0..week_count {
        week = build_week(week);
        weeks.push(week);
    }

    weeks
}

/// Expand weekly anchors into the seven dates of each week they close.
pub fn populate_weeks_by_dates(anchors: &[NaiveDate]) -> Vec<NaiveDate> {
    anchors
        .iter()
        .flat_map(|anchor| {
            let start = *anchor - Duration::days(DAYS_PER_WEEK);
            (0..DAYS_PER_WEEK).map(move |day| start + Duration::days(day))
        })
        .collect()
}

/// Week count of the period at `slot` within `quarter`.
pub fn week_count(quarter: usize, slot: usize, leap: bool) -> usize {
    match (quarter, slot) {
        (_, 0) => 5,
        (0, 2) if leap => 5,
        _ => 4,
    }
}

/// The anchor preceding the first week of the fiscal year.
///
/// It sits in the month before `settings.month` of the previous calendar year,
/// on the day obtained by subtracting the weekday of the first of
/// `settings.month` from that month's length. Days past the end of the anchor
/// month roll over into the following month.
fn first_anchor(settings: FiscalSettings) -> NaiveDate {
    let previous_year = settings.year - 1;
    let month = settings.month.clamp(1, 12);

    let first_of_month = NaiveDate::from_ymd_opt(previous_year, month, 1)
        .unwrap_or(NaiveDate::MIN);
    let weekday = first_of_month.weekday().num_days_from_sunday();
    let day = days_in_month(previous_year, month) - weekday;

    let (anchor_year, anchor_month) = if month == 1 {
        (previous_year - 1, 12)
    } else {
        (previous_year, month - 1)
    };

    let anchor_month_start = NaiveDate::from_ymd_opt(anchor_year, anchor_month, 1)
        .unwrap_or(NaiveDate::MIN);
    anchor_month_start + Duration::days(i64::from(day) - 1)
}

/// Generate the twelve periods of a fiscal year.
pub fn generate_fiscal_calendar(settings: FiscalSettings) -> FiscalCalendar {
    let leap = is_leap_fiscal_year(settings.year);
    let mut periods = Vec::with_capacity(PERIODS_PER_YEAR);
    let mut anchor = first_anchor(settings);

    for quarter in 0..QUARTERS {
        for slot in 0..PERIODS_PER_QUARTER {
            let weeks = week_count(quarter, slot, leap);
            let anchors = fiscal_weeks(anchor, weeks);
            anchor = anchors[anchors.len() - 1];

            let index = quarter * PERIODS_PER_QUARTER + slot;
            periods.push(FiscalPeriod {
                id: PeriodId::new(settings.year, index as u8),
                weeks,
                dates: populate_weeks_by_dates(&anchors),
            });
        }
    }

    FiscalCalendar {
        year: settings.year,
        periods,
    }
}

/// Fiscal calendars generated during a run, keyed by fiscal year
#[derive(Debug, Clone)]
pub struct CalendarCache {
    month: u32,
    calendars: HashMap<i32, FiscalCalendar>,
}

impl CalendarCache {
    pub fn new(month: u32) -> Self {
        Self {
            month,
            calendars: HashMap::new(),
        }
    }

    pub fn get(&mut self, year: i32) -> &FiscalCalendar {
        let month = self.month;
        self.calendars
            .entry(year)
            .or_insert_with(|| generate_fiscal_calendar(FiscalSettings::new(year, month)))
    }

    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }
}
