//! Job file and checkpoint commands: init, status, reset

use std::path::{Path, PathBuf};

use crate::checkpoint::CheckpointStore;
use crate::cli::error::CliError;
use crate::cli::prompt::confirm;
use crate::config::{JobConfig, sample_config};
use crate::source;

/// Write the sample job file to `path`
pub fn handle_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::FileWriteError(parent.to_path_buf(), e.to_string()))?;
    }
    std::fs::write(path, sample_config())
        .map_err(|e| CliError::FileWriteError(path.to_path_buf(), e.to_string()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Completed and pending inputs of a job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobStatus {
    pub checkpoint: PathBuf,
    pub completed: Vec<String>,
    pub pending: Vec<PathBuf>,
}

/// Handle the status command
pub fn handle_status(config_path: &Path) -> Result<JobStatus, CliError> {
    let config = JobConfig::load(config_path)?;
    let checkpoint = CheckpointStore::open(&config.state_dir(), &config.name)?;
    let inputs = source::discover(&config.input_dir(), &config.input.pattern)?;

    let status = JobStatus {
        checkpoint: checkpoint.path().to_path_buf(),
        completed: checkpoint.completed().into_iter().map(String::from).collect(),
        pending: inputs
            .into_iter()
            .filter(|input| !checkpoint.is_complete(input))
            .collect(),
    };

    println!("Checkpoint: {}", status.checkpoint.display());
    println!("Completed: {}", status.completed.len());
    for id in &status.completed {
        println!("  {}", id);
    }
    println!("Pending: {}", status.pending.len());
    for path in &status.pending {
        println!("  {}", path.display());
    }
    Ok(status)
}

/// Handle the reset command. Returns whether the checkpoint was cleared.
pub fn handle_reset(config_path: &Path, yes: bool) -> Result<bool, CliError> {
    let config = JobConfig::load(config_path)?;
    let mut checkpoint = CheckpointStore::open(&config.state_dir(), &config.name)?;
    if checkpoint.is_empty() {
        println!("Nothing to reset for '{}'", config.name);
        return Ok(false);
    }
    let question = format!(
        "Forget {} completed file(s) for '{}'?",
        checkpoint.len(),
        config.name
    );
    if !yes && !confirm(&question, false)? {
        println!("Checkpoint kept");
        return Ok(false);
    }
    checkpoint.reset()?;
    println!("Checkpoint cleared: {}", checkpoint.path().display());
    Ok(true)
}
