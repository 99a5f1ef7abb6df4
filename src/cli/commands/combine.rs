//! Combine command implementation

use std::path::PathBuf;

use crate::cli::commands::run::{ResumeChoice, open_checkpoint};
use crate::cli::error::CliError;
use crate::cli::logging::build_dispatch;
use crate::config::JobConfig;
use crate::runner::{PipelineRunner, RunContext, RunSummary};
use crate::source::{self, EncodingChoice, SourceOptions};

#[derive(Debug, Clone)]
pub struct CombineArgs {
    /// Each sub-directory is combined into one file
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Checkpoint key
    pub name: String,
    /// Defaults to `<input_dir>/.tabflow`
    pub state_dir: Option<PathBuf>,
    pub encoding: EncodingChoice,
    pub resume: ResumeChoice,
    pub log_level: String,
}

/// Handle the combine command
pub fn handle_combine(args: &CombineArgs) -> Result<RunSummary, CliError> {
    if !args.input_dir.is_dir() {
        return Err(CliError::FileNotFound(args.input_dir.clone()));
    }
    let mut config = JobConfig::new();
    config.name = args.name.clone();
    config.state.dir = args
        .state_dir
        .clone()
        .unwrap_or_else(|| args.input_dir.join(".tabflow"));
    config.validate()?;

    let dirs: Vec<PathBuf> = source::discover_dirs(&args.input_dir)?
        .into_iter()
        .filter(|d| d.file_name().is_some_and(|n| !n.to_string_lossy().starts_with('.')))
        .collect();
    if dirs.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "{} has no sub-directories to combine",
            args.input_dir.display()
        )));
    }

    let dispatch = build_dispatch(&args.log_level, None)?;
    let checkpoint = open_checkpoint(&config, args.resume)?;
    let context = RunContext::new(checkpoint).with_dispatch(dispatch);
    let options = SourceOptions {
        encoding: args.encoding,
        ..SourceOptions::default()
    };
    let mut runner = PipelineRunner::new(context, (), options);
    let summary = runner.combine(&dirs, &args.output_dir);

    println!(
        "Combined {} director(ies), skipped {}, failed {} in {} ({} rows)",
        summary.files_processed,
        summary.files_skipped,
        summary.files_failed,
        summary.duration_string(),
        summary.rows_written
    );
    for path in summary.failed_files() {
        println!("  pending: {}", path.display());
    }
    Ok(summary)
}
