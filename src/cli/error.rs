//! CLI-specific error types

use std::path::PathBuf;

use thiserror::Error;

use crate::error::{CheckpointError, ConfigError, PipelineError, SourceError, cause_chain};

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("{0} file(s) failed; run again to retry them")]
    RunFailed(usize),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Checkpoint(#[from] CheckpointError),

    /// A pipeline or source error, rendered with its cause chain
    #[error("{0}")]
    Pipeline(String),
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        CliError::Pipeline(cause_chain(err))
    }
}

impl From<SourceError> for CliError {
    fn from(err: SourceError) -> Self {
        CliError::Pipeline(cause_chain(err))
    }
}
