use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::errors::ReportError;

/// Vendor-facing fiscal month for period index 0..=11, in calendar order
const FISCAL_MONTHS: [u32; 12] = [12, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Identifier of one period of a generated fiscal calendar, written `<year>-<index>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodId {
    pub year: i32,
    pub index: u8,
}

impl PeriodId {
    pub fn new(year: i32, index: u8) -> Self {
        Self { year, index }
    }

    /// Translate into the fiscal year/month pair the report service expects
    pub fn align(&self) -> FiscalMonth {
        let year = if self.index == 0 {
            self.year - 1
        } else {
            self.year
        };
        let period = FISCAL_MONTHS[usize::from(self.index) % FISCAL_MONTHS.len()];
        FiscalMonth { year, period }
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.index)
    }
}

impl FromStr for PeriodId {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, index) = s
            .split_once('-')
            .ok_or_else(|| ReportError::validation(format!("Invalid period identifier: {}", s)))?;

        let year = year
            .trim()
            .parse::<i32>()
            .map_err(|_| ReportError::validation(format!("Invalid period year in: {}", s)))?;
        let index = index
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|index| usize::from(*index) < FISCAL_MONTHS.len())
            .ok_or_else(|| ReportError::validation(format!("Invalid period index in: {}", s)))?;

        Ok(PeriodId { year, index })
    }
}

/// Fiscal year and month as sent to the report service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FiscalMonth {
    pub year: i32,
    pub period: u32,
}

/// Parse a `<year>-<index>` identifier and align it to a fiscal year/month.
pub fn align_period(period_id: &str) -> Result<FiscalMonth, ReportError> {
    Ok(period_id.parse::<PeriodId>()?.align())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_first_period_rolls_back_a_year() {
        assert_eq!(
            align_period("2020-0").unwrap(),
            FiscalMonth { year: 2019, period: 12 }
        );
    }

    #[test]
    fn test_align_other_periods_keep_year() {
        assert_eq!(
            align_period("2020-1").unwrap(),
            FiscalMonth { year: 2020, period: 1 }
        );
        assert_eq!(
            align_period("2020-11").unwrap(),
            FiscalMonth { year: 2020, period: 11 }
        );
    }

    #[test]
    fn test_display_round_trips() {
        let id = PeriodId::new(2021, 7);
        assert_eq!(id.to_string(), "2021-7");
        assert_eq!("2021-7".parse::<PeriodId>().unwrap(), id);
    }

    #[test]
    fn test_rejects_malformed_identifiers() {
        assert!(align_period("2020").is_err());
        assert!(align_period("abcd-1").is_err());
        assert!(align_period("2020-12").is_err());
        assert!(align_period("2020-x").is_err());
    }
}
