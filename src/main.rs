use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use tracing::{error, info};

use report_extractor::cli::{Cli, Commands};
use report_extractor::config::Config;
use report_extractor::fiscal::{generate_fiscal_calendar, CalendarCache, FiscalSettings};
use report_extractor::pipeline;
use report_extractor::resolver::cover_periods;

/// Exit code telling the caller the run may succeed if retried
const EXIT_CONNECTIVITY: i32 = 2;
const EXIT_FAILURE: i32 = 1;

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("report_extractor=info"))
    };

    // Log to both console and file
    let file_appender = tracing_appender::rolling::never(".", "report-extractor.log");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter()))
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(filter()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Extract { data } => {
            let config = Config::from_env()?;
            let today = Utc::now().date_naive();

            match pipeline::extract(Path::new(data), &config, today).await {
                Ok(summary) => {
                    info!(
                        "Extraction {} complete: {} rows from {} files, {} units without data",
                        summary.run_id,
                        summary.rows_written,
                        summary.files_transformed,
                        summary.empty_units.len()
                    );
                    if let Some(output) = summary.output {
                        info!("Output table: {}", output.display());
                    }
                }
                Err(e) => {
                    error!("Extraction failed: {}", e);
                    let code = if e.is_retryable() {
                        EXIT_CONNECTIVITY
                    } else {
                        EXIT_FAILURE
                    };
                    std::process::exit(code);
                }
            }
        }

        Commands::Calendar { year, month } => {
            let calendar = generate_fiscal_calendar(FiscalSettings::new(*year, *month));
            println!(
                "Fiscal year {} ({} days{})",
                calendar.year,
                calendar.total_days(),
                if calendar.is_leap() { ", leap" } else { "" }
            );
            for period in &calendar.periods {
                let fiscal = period.id.align();
                println!(
                    "{:>8}  {} - {}  {} weeks  -> {}/{:02}",
                    period.id.to_string(),
                    period.first_day(),
                    period.last_day(),
                    period.weeks,
                    fiscal.year,
                    fiscal.period
                );
            }
        }

        Commands::Periods { from, to, month } => {
            if to < from {
                anyhow::bail!("--to {} is before --from {}", to, from);
            }
            let mut cache = CalendarCache::new(*month);
            let coverage = cover_periods(*from, *to, &mut cache);
            println!("Found {} periods:", coverage.periods.len());
            for id in &coverage.periods {
                let fiscal = id.align();
                println!("{:>8}  -> {}/{:02}", id.to_string(), fiscal.year, fiscal.period);
            }
            if !coverage.uncovered.is_empty() {
                println!("{} dates belong to no fiscal period:", coverage.uncovered.len());
                for day in &coverage.uncovered {
                    println!("  {}", day);
                }
            }
        }
    }

    Ok(())
}
