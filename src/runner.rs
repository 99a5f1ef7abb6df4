//! Batch orchestration
//!
//! The runner drives input files one at a time through
//! source -> transforms -> sink, and records each file in the checkpoint only
//! after its output is final. A failing file is logged and left pending; the
//! batch carries on with the next one.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{Dispatch, debug, error, info, warn};
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::error::{ConfigError, PipelineError, cause_chain};
use crate::plan::FilePlanner;
use crate::progress::FileProgress;
use crate::segment::Segment;
use crate::sink::{self, combine_directory};
use crate::source::{self, SourceOptions};

/// Errors kept verbatim in a [`RunSummary`]; the rest are only counted
const MAX_SUMMARY_ERRORS: usize = 100;

/// Everything a run needs from its surroundings. Passed in explicitly; the
/// library keeps no process-wide logger or progress state.
pub struct RunContext {
    checkpoint: CheckpointStore,
    dispatch: Dispatch,
    progress: bool,
    run_id: Uuid,
}

impl RunContext {
    /// A context that logs nowhere and draws no progress bars
    pub fn new(checkpoint: CheckpointStore) -> Self {
        Self {
            checkpoint,
            dispatch: Dispatch::none(),
            progress: false,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn checkpoint_mut(&mut self) -> &mut CheckpointStore {
        &mut self.checkpoint
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

/// Per-file processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileState::Pending => write!(f, "pending"),
            FileState::InProgress => write!(f, "in_progress"),
            FileState::Complete => write!(f, "complete"),
            FileState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome for one input file (or combine directory)
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub state: FileState,
    /// Complete from an earlier run; not processed again
    pub skipped: bool,
    pub rows_read: u64,
    pub rows_written: u64,
    pub malformed_records: u64,
    #[serde(skip)]
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl FileReport {
    fn new(path: &Path, state: FileState) -> Self {
        Self {
            path: path.to_path_buf(),
            state,
            skipped: false,
            rows_read: 0,
            rows_written: 0,
            malformed_records: 0,
            elapsed: Duration::ZERO,
            error: None,
        }
    }
}

/// Statistics for a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_processed: usize,
    /// Already complete before this run
    pub files_skipped: usize,
    pub files_failed: usize,
    pub rows_read: u64,
    pub rows_written: u64,
    /// JSON lines skipped as malformed
    pub malformed_records: u64,
    pub errors_count: usize,
    /// First 100 errors
    pub errors: Vec<String>,
    pub files: Vec<FileReport>,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors_count += 1;
        if self.errors.len() < MAX_SUMMARY_ERRORS {
            self.errors.push(error);
        }
    }

    /// Rows read per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows_read as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    /// Inputs left for a later run
    pub fn failed_files(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|f| f.state == FileState::Failed)
            .map(|f| f.path.as_path())
    }

    pub fn is_success(&self) -> bool {
        self.files_failed == 0
    }
}

#[derive(Debug, Default)]
struct UnitOutcome {
    rows_read: u64,
    rows_written: u64,
    malformed_records: u64,
}

/// Drives a batch of inputs through a [`FilePlanner`]
pub struct PipelineRunner<P> {
    context: RunContext,
    planner: P,
    options: SourceOptions,
}

impl<P> PipelineRunner<P> {
    pub fn new(context: RunContext, planner: P, options: SourceOptions) -> Self {
        Self {
            context,
            planner,
            options,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn into_context(self) -> RunContext {
        self.context
    }

    /// Concatenate each directory in `dirs` into `<out_dir>/<dir name>.csv`.
    /// Directories are the checkpoint units.
    pub fn combine(&mut self, dirs: &[PathBuf], out_dir: &Path) -> RunSummary {
        let Self {
            context, options, ..
        } = self;
        let dispatch = context.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || {
            info!(run_id = %context.run_id, dirs = dirs.len(), "Starting combine");
            drive(&mut context.checkpoint, dirs, |dir| {
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "combined".to_string());
                let report =
                    combine_directory(dir, &out_dir.join(format!("{}.csv", name)), options)?;
                Ok(UnitOutcome {
                    rows_read: report.rows,
                    rows_written: report.rows,
                    malformed_records: 0,
                })
            })
        })
    }
}

impl<P: FilePlanner> PipelineRunner<P> {
    /// Process every input not already complete, in the order given.
    ///
    /// A pending input whose output name clashes with another input of the
    /// batch fails without writing, so it can never replace the other's output.
    pub fn run(&mut self, inputs: &[PathBuf]) -> RunSummary {
        let Self {
            context,
            planner,
            options,
        } = self;
        let dispatch = context.dispatch.clone();
        let progress = context.progress;
        let collisions = sink::output_collisions(inputs);
        tracing::dispatcher::with_default(&dispatch, || {
            info!(run_id = %context.run_id, files = inputs.len(), "Starting run");
            drive(&mut context.checkpoint, inputs, |input| {
                if let Some(others) = collisions.get(input) {
                    return Err(ConfigError::OutputCollision {
                        path: input.to_path_buf(),
                        output: sink::output_file_name(input),
                        others: others
                            .iter()
                            .map(|o| o.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }
                    .into());
                }
                process_file(&*planner, options, progress, input)
            })
        })
    }
}

/// Run `process` for each unit not yet in the checkpoint, recording each
/// success before moving on
fn drive<F>(checkpoint: &mut CheckpointStore, units: &[PathBuf], mut process: F) -> RunSummary
where
    F: FnMut(&Path) -> Result<UnitOutcome, PipelineError>,
{
    let started = Instant::now();
    let mut summary = RunSummary::new();

    for unit in units {
        let file = unit.display().to_string();
        if checkpoint.is_complete(unit) {
            info!(file = %file, "Skipping, already complete");
            summary.files_skipped += 1;
            let mut report = FileReport::new(unit, FileState::Complete);
            report.skipped = true;
            summary.files.push(report);
            continue;
        }

        debug!(file = %file, state = %FileState::InProgress, "Starting file");
        let file_started = Instant::now();
        let result = process(unit).and_then(|outcome| {
            checkpoint.mark_complete(unit)?;
            Ok(outcome)
        });
        let elapsed = file_started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match result {
            Ok(outcome) => {
                info!(
                    file = %file,
                    rows_read = outcome.rows_read,
                    rows_written = outcome.rows_written,
                    elapsed_ms,
                    "File complete"
                );
                summary.files_processed += 1;
                summary.rows_read += outcome.rows_read;
                summary.rows_written += outcome.rows_written;
                summary.malformed_records += outcome.malformed_records;
                summary.files.push(FileReport {
                    rows_read: outcome.rows_read,
                    rows_written: outcome.rows_written,
                    malformed_records: outcome.malformed_records,
                    elapsed,
                    ..FileReport::new(unit, FileState::Complete)
                });
            }
            Err(err) => {
                let kind = err.kind();
                let chain = cause_chain(err);
                error!(file = %file, elapsed_ms, kind = %kind, error = %chain, "File failed");
                summary.files_failed += 1;
                summary.add_error(format!("{}: {}", file, chain));
                summary.files.push(FileReport {
                    elapsed,
                    error: Some(chain),
                    ..FileReport::new(unit, FileState::Failed)
                });
            }
        }
    }

    summary.duration = started.elapsed();
    info!(
        processed = summary.files_processed,
        skipped = summary.files_skipped,
        failed = summary.files_failed,
        rows_written = summary.rows_written,
        elapsed = %summary.duration_string(),
        "Run finished"
    );
    summary
}

fn process_file<P: FilePlanner + ?Sized>(
    planner: &P,
    options: &SourceOptions,
    progress_enabled: bool,
    input: &Path,
) -> Result<UnitOutcome, PipelineError> {
    let mut source = source::open(input, options)?;
    let columns = source.columns().to_vec();
    if columns.is_empty() {
        info!(file = %input.display(), "No records, nothing to write");
        return Ok(UnitOutcome::default());
    }

    let mut plan = planner.plan(input, &columns)?;

    let total = if progress_enabled && std::io::stderr().is_terminal() {
        source::count_rows(input, options).ok()
    } else {
        None
    };
    let label = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let progress = FileProgress::new(progress_enabled, total, &label);

    plan.sink.begin()?;
    let mut outcome = UnitOutcome::default();
    let mut segments = 0usize;
    for segment in source.by_ref() {
        let segment = segment?;
        let rows = segment.len() as u64;
        let shaped = plan.transforms.apply(segment)?;
        outcome.rows_read += rows;
        outcome.rows_written += plan.sink.write_segment(&shaped)?;
        segments += 1;
        progress.advance(rows);
    }
    if segments == 0 {
        // Header-only input still produces a header-only output
        let shaped = plan.transforms.apply(Segment::new(columns))?;
        plan.sink.write_segment(&shaped)?;
    }
    plan.sink.finish()?;
    progress.finish();

    outcome.malformed_records = source.skipped_records();
    let replacements = source.decode_replacements();
    if replacements > 0 {
        warn!(
            file = %input.display(),
            replacements,
            "Replaced undecodable bytes with U+FFFD"
        );
    }
    debug!(
        file = %input.display(),
        segments,
        output = %plan.sink.destination().display(),
        "Wrote file output"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::FilePlan;
    use crate::sink::SingleFileSink;
    use crate::transform::{DropColumns, TransformChain};
    use std::fs;
    use tempfile::TempDir;

    /// Drops `secret` and writes `<out>/<name>`
    struct DropSecret {
        out: PathBuf,
    }

    impl FilePlanner for DropSecret {
        fn plan(&self, input: &Path, columns: &[String]) -> Result<FilePlan, PipelineError> {
            let transforms = TransformChain::new().with(DropColumns::new(vec!["secret".into()]));
            let output_columns = columns.iter().filter(|c| *c != "secret").cloned().collect();
            let name = input.file_name().map(PathBuf::from).unwrap_or_default();
            Ok(FilePlan {
                transforms,
                sink: Box::new(SingleFileSink::new(self.out.join(name))),
                output_columns,
            })
        }
    }

    fn runner(root: &Path) -> PipelineRunner<DropSecret> {
        let checkpoint = CheckpointStore::open(&root.join("state"), "test").unwrap();
        PipelineRunner::new(
            RunContext::new(checkpoint),
            DropSecret {
                out: root.join("out"),
            },
            SourceOptions {
                chunk_size: 2,
                ..SourceOptions::default()
            },
        )
    }

    #[test]
    fn test_run_writes_output_and_checkpoints() {
        let root = TempDir::new().unwrap();
        let input = root.path().join("a.csv");
        fs::write(&input, "id,secret\n1,x\n2,y\n3,z\n").unwrap();

        let mut runner = runner(root.path());
        let summary = runner.run(std::slice::from_ref(&input));
        assert!(summary.is_success());
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.rows_read, 3);
        assert_eq!(
            fs::read_to_string(root.path().join("out/a.csv")).unwrap(),
            "id\n1\n2\n3\n"
        );
        assert!(runner.context().checkpoint().is_complete(&input));

        let again = runner.run(std::slice::from_ref(&input));
        assert_eq!(again.files_skipped, 1);
        assert_eq!(again.files_processed, 0);
        assert!(again.files[0].skipped);
    }

    #[test]
    fn test_failed_file_is_isolated_and_left_pending() {
        let root = TempDir::new().unwrap();
        let bad = root.path().join("bad.csv");
        let good = root.path().join("good.csv");
        fs::write(&bad, "id,secret\n1,x,extra\n").unwrap();
        fs::write(&good, "id,secret\n1,x\n").unwrap();

        let mut runner = runner(root.path());
        let summary = runner.run(&[bad.clone(), good.clone()]);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.errors_count, 1);
        assert_eq!(summary.failed_files().collect::<Vec<_>>(), vec![bad.as_path()]);
        assert!(summary.errors[0].contains("Read failed"));

        let checkpoint = runner.context().checkpoint();
        assert!(!checkpoint.is_complete(&bad));
        assert!(checkpoint.is_complete(&good));
        assert!(!root.path().join("out/bad.csv").exists());
    }

    #[test]
    fn test_header_only_input_writes_header() {
        let root = TempDir::new().unwrap();
        let input = root.path().join("h.csv");
        fs::write(&input, "id,secret\n").unwrap();

        let summary = runner(root.path()).run(std::slice::from_ref(&input));
        assert_eq!(summary.files_processed, 1);
        assert_eq!(
            fs::read_to_string(root.path().join("out/h.csv")).unwrap(),
            "id\n"
        );
    }

    #[test]
    fn test_combine_checkpoints_directories() {
        let root = TempDir::new().unwrap();
        let batch = root.path().join("in/batch");
        fs::create_dir_all(&batch).unwrap();
        fs::write(batch.join("1.csv"), "a,b\n1,2\n").unwrap();
        fs::write(batch.join("2.csv"), "b,a\n4,3\n").unwrap();

        let mut runner = runner(root.path());
        let out = root.path().join("combined");
        let summary = runner.combine(std::slice::from_ref(&batch), &out);
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(
            fs::read_to_string(out.join("batch.csv")).unwrap(),
            "a,b\n1,2\n3,4\n"
        );
        assert!(runner.context().checkpoint().is_complete(&batch));
    }

    #[test]
    fn test_duration_string() {
        let mut summary = RunSummary::new();
        summary.duration = Duration::from_secs(42);
        assert_eq!(summary.duration_string(), "42s");
        summary.duration = Duration::from_secs(90);
        assert_eq!(summary.duration_string(), "1m 30s");
        summary.duration = Duration::from_secs(3725);
        assert_eq!(summary.duration_string(), "1h 2m 5s");
    }

    #[test]
    fn test_error_list_is_capped() {
        let mut summary = RunSummary::new();
        for i in 0..150 {
            summary.add_error(format!("error {}", i));
        }
        assert_eq!(summary.errors_count, 150);
        assert_eq!(summary.errors.len(), MAX_SUMMARY_ERRORS);
    }
}
