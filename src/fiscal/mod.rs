//! Fiscal calendar engine
//!
//! Computes 5-4-4 period boundaries and translates period identifiers into the
//! fiscal year/month pairs used by financial report requests.

pub mod calendar;
pub mod period;

pub use calendar::{
    days_in_month, generate_fiscal_calendar, is_leap_fiscal_year, CalendarCache, FiscalCalendar,
    FiscalPeriod, FiscalSettings, DATE_MASK, DEFAULT_FISCAL_START_MONTH,
};
pub use period::{align_period, FiscalMonth, PeriodId};
