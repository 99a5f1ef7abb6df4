//! Run command implementation

use std::path::PathBuf;

use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::cli::error::CliError;
use crate::cli::logging::build_dispatch;
use crate::cli::prompt::confirm;
use crate::config::JobConfig;
use crate::plan::JobPlanner;
use crate::runner::{PipelineRunner, RunContext, RunSummary};
use crate::source;

/// What to do with completion records left by an earlier run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    /// Ask once, before the first file
    Ask,
    Resume,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: PathBuf,
    pub resume: ResumeChoice,
    pub progress: bool,
    pub log_level: String,
    /// Write the durable log file under `state.log_dir`
    pub log_file: bool,
}

/// Open the job's checkpoint and settle the resume question for the whole run
pub(crate) fn open_checkpoint(
    config: &JobConfig,
    resume: ResumeChoice,
) -> Result<CheckpointStore, CliError> {
    let mut checkpoint = CheckpointStore::open(&config.state_dir(), &config.name)?;
    if checkpoint.is_empty() {
        return Ok(checkpoint);
    }
    let keep = match resume {
        ResumeChoice::Resume => true,
        ResumeChoice::Fresh => false,
        ResumeChoice::Ask => confirm(
            &format!(
                "Found {} completed file(s) from an earlier '{}' run. Resume?",
                checkpoint.len(),
                config.name
            ),
            true,
        )?,
    };
    if !keep {
        checkpoint.reset()?;
    }
    Ok(checkpoint)
}

/// Handle the run command
pub fn handle_run(args: &RunArgs) -> Result<RunSummary, CliError> {
    if !args.config.exists() {
        return Err(CliError::FileNotFound(args.config.clone()));
    }
    let config = JobConfig::load(&args.config)?;

    let log_file = config.log_dir().join(format!("{}.log", config.name));
    let dispatch = build_dispatch(&args.log_level, args.log_file.then_some(log_file.as_path()))?;

    let checkpoint = open_checkpoint(&config, args.resume)?;
    let planner = tracing::dispatcher::with_default(&dispatch, || JobPlanner::new(&config))?;
    let inputs = source::discover(&config.input_dir(), &config.input.pattern)?;
    tracing::dispatcher::with_default(&dispatch, || {
        info!(
            job = %config.name,
            inputs = inputs.len(),
            completed = checkpoint.len(),
            "Discovered inputs"
        );
    });

    let context = RunContext::new(checkpoint)
        .with_dispatch(dispatch)
        .with_progress(args.progress);
    let mut runner = PipelineRunner::new(context, planner, config.source_options()?);
    let summary = runner.run(&inputs);

    println!(
        "Processed {} file(s), skipped {}, failed {} in {} ({} rows read, {} written, {:.0} rows/s)",
        summary.files_processed,
        summary.files_skipped,
        summary.files_failed,
        summary.duration_string(),
        summary.rows_read,
        summary.rows_written,
        summary.throughput()
    );
    if summary.malformed_records > 0 {
        println!("Skipped {} malformed record(s)", summary.malformed_records);
    }
    for path in summary.failed_files() {
        println!("  pending: {}", path.display());
    }
    Ok(summary)
}
