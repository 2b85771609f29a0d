use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::parse_date;
use crate::fiscal::DEFAULT_FISCAL_START_MONTH;

/// Years expressible with the `YYYYMMDD` date mask
const MIN_YEAR: i64 = 1;
const MAX_YEAR: i64 = 9999;

#[derive(Parser)]
#[command(name = "report-extractor")]
#[command(about = "Extract sales and financial reports into keyed CSV tables")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the extraction described by <data>/config.json
    Extract {
        /// Data directory holding config.json and out/tables
        #[arg(short, long, default_value = "/data")]
        data: String,
    },

    /// Print the periods of a fiscal year
    Calendar {
        /// Fiscal year
        #[arg(short, long, value_parser = clap::value_parser!(i32).range(MIN_YEAR..=MAX_YEAR))]
        year: i32,

        /// Calendar month (1-12) the fiscal year is keyed on
        #[arg(short, long, default_value_t = DEFAULT_FISCAL_START_MONTH, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },

    /// Print the fiscal periods covering a date window
    Periods {
        /// Start date (YYYYMMDD)
        #[arg(long, value_parser = parse_date_arg)]
        from: NaiveDate,

        /// End date (YYYYMMDD)
        #[arg(long, value_parser = parse_date_arg)]
        to: NaiveDate,

        /// Calendar month (1-12) the fiscal year is keyed on
        #[arg(short, long, default_value_t = DEFAULT_FISCAL_START_MONTH, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value, "date").map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_defaults_to_data_dir() {
        let cli = Cli::parse_from(["report-extractor", "extract"]);
        match cli.command {
            Commands::Extract { data } => assert_eq!(data, "/data"),
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_periods_parses_dates() {
        let cli = Cli::parse_from([
            "report-extractor",
            "periods",
            "--from",
            "20200101",
            "--to",
            "20200131",
        ]);
        match cli.command {
            Commands::Periods { from, to, month } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
                assert_eq!(to, NaiveDate::from_ymd_opt(2020, 1, 31).unwrap());
                assert_eq!(month, DEFAULT_FISCAL_START_MONTH);
            }
            _ => panic!("expected periods"),
        }
    }

    #[test]
    fn test_rejects_bad_month() {
        assert!(Cli::try_parse_from(["report-extractor", "calendar", "--year", "2020", "--month", "13"]).is_err());
    }

    #[test]
    fn test_calendar_year_is_bounded() {
        assert!(Cli::try_parse_from(["report-extractor", "calendar", "--year", "262143"]).is_err());
        assert!(Cli::try_parse_from(["report-extractor", "calendar", "--year", "0"]).is_err());

        let cli = Cli::parse_from(["report-extractor", "calendar", "--year", "9999"]);
        match cli.command {
            Commands::Calendar { year, .. } => assert_eq!(year, 9999),
            _ => panic!("expected calendar"),
        }
    }
}
