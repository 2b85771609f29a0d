//! One extraction run: resolve → build units → fetch → decompress → transform.
//!
//! Every stage can fail the run. The staging directory lives only as long as
//! the run, so it is removed whether the run completes or fails.

use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::{Config, Job};
use crate::downloader::{decompress_all, fetch_all, HttpReportService, ReportService};
use crate::errors::Result;
use crate::params::build_units;
use crate::resolver::resolve;
use crate::storage::{create_staging_dir, write_manifest, Manifest, OutputTable};
use crate::transform::KeyTransformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ParamsBuilt,
    Fetching,
    Decompressing,
    Empty,
    Transforming,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "INIT",
            RunState::ParamsBuilt => "PARAMS_BUILT",
            RunState::Fetching => "FETCHING",
            RunState::Decompressing => "DECOMPRESSING",
            RunState::Empty => "EMPTY",
            RunState::Transforming => "TRANSFORMING",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub units: usize,
    /// Logical names of units that had no data
    pub empty_units: Vec<String>,
    pub files_transformed: usize,
    pub rows_written: usize,
    /// Rows whose extra fields past the header were dropped
    pub truncated_rows: usize,
    pub output: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            units: 0,
            empty_units: Vec::new(),
            files_transformed: 0,
            rows_written: 0,
            truncated_rows: 0,
            output: None,
            manifest: None,
        }
    }
}

pub struct Pipeline<'a> {
    job: &'a Job,
    config: &'a Config,
    run_id: Uuid,
    state: RunState,
    history: Vec<RunState>,
}

impl<'a> Pipeline<'a> {
    pub fn new(job: &'a Job, config: &'a Config) -> Self {
        Self {
            job,
            config,
            run_id: Uuid::new_v4(),
            state: RunState::Init,
            history: vec![RunState::Init],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state the run has passed through, starting with `Init`
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn transition(&mut self, next: RunState) {
        info!("Run state {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Execute the run and write the output table into `out_dir`
    pub async fn run(&mut self, service: &dyn ReportService, out_dir: &Path) -> Result<RunSummary> {
        let span = tracing::info_span!("run", run_id = %self.run_id, kind = %self.job.kind);

        let result = self.execute(service, out_dir).instrument(span).await;
        if let Err(e) = &result {
            self.transition(RunState::Failed);
            if e.is_retryable() {
                error!("Run {} failed with a connection problem: {}", self.run_id, e);
            } else {
                error!("Run {} failed: {}", self.run_id, e);
            }
        }
        result
    }

    async fn execute(&mut self, service: &dyn ReportService, out_dir: &Path) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.run_id);

        let range = resolve(self.job, self.config)?;
        let units = build_units(self.job, &range);
        summary.units = units.len();
        info!(
            "Built {} {} report requests for {} vendors",
            units.len(),
            self.job.kind,
            self.job.vendors.len()
        );
        self.transition(RunState::ParamsBuilt);

        let staging = create_staging_dir()?;

        self.transition(RunState::Fetching);
        let fetched = fetch_all(service, &units, staging.path(), self.config.concurrency).await?;
        summary.empty_units.extend(fetched.empty.iter().cloned());

        if fetched.downloaded.is_empty() {
            return Ok(self.finish_empty(summary, staging));
        }

        self.transition(RunState::Decompressing);
        let decompressed = decompress_all(&fetched.downloaded, self.config.concurrency).await?;
        summary.empty_units.extend(decompressed.empty.iter().cloned());

        if decompressed.files.is_empty() {
            return Ok(self.finish_empty(summary, staging));
        }

        self.transition(RunState::Transforming);
        std::fs::create_dir_all(out_dir)?;
        let table = OutputTable::new(out_dir.join(&self.job.output_file));
        let mut transformer = KeyTransformer::new(self.job.kind, &self.job.primary_keys);

        for file in &decompressed.files {
            let stats = transformer.transform_file(file, &table)?;
            summary.rows_written += stats.rows_written;
            summary.truncated_rows += stats.truncated_rows;
            summary.files_transformed += 1;
        }

        if table.exists() {
            summary.manifest = Some(write_manifest(table.path(), &Manifest::default())?);
            summary.output = Some(table.path().to_path_buf());
        } else {
            info!("No data rows to write");
        }

        close_staging(staging);
        self.transition(RunState::Done);
        info!(
            "Run finished: {} units, {} empty, {} rows written, {} rows truncated",
            summary.units,
            summary.empty_units.len(),
            summary.rows_written,
            summary.truncated_rows
        );
        Ok(summary)
    }

    fn finish_empty(&mut self, summary: RunSummary, staging: tempfile::TempDir) -> RunSummary {
        self.transition(RunState::Empty);
        info!("No data to process");
        close_staging(staging);
        self.transition(RunState::Done);
        summary
    }
}

fn close_staging(staging: tempfile::TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!("Failed to remove staging directory {}: {}", path.display(), e);
    }
}

/// Load the job from `data_dir`, run it against the configured report service
/// and write results under `<data_dir>/out/tables`
pub async fn extract(data_dir: &Path, config: &Config, today: NaiveDate) -> Result<RunSummary> {
    let job = Job::load(data_dir, today)?;
    info!(
        "Extracting {} reports from {} to {}",
        job.kind, job.start_date, job.end_date
    );

    let service = HttpReportService::new(config, job.credentials.clone())?;
    let out_dir = Job::tables_out_dir(data_dir);

    Pipeline::new(&job, config).run(&service, &out_dir).await
}
