//! Error types for the pipeline
//!
//! Every layer has its own error enum; [`PipelineError`] wraps them at the
//! per-file boundary so the runner can classify and log a failure without
//! losing the underlying cause chain.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening or streaming an input file
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path} at record {record}")]
    Csv {
        path: PathBuf,
        record: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read {path} at line {line}")]
    Io {
        path: PathBuf,
        line: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} has no header row")]
    MissingHeader { path: PathBuf },

    #[error("{path} record {record} has {found} fields but the header has {expected}")]
    TooManyFields {
        path: PathBuf,
        record: u64,
        expected: usize,
        found: usize,
    },

    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),

    #[error("Unsupported input format for {0}")]
    UnsupportedFormat(PathBuf),
}

/// Errors raised while resolving a file's configuration or loading reference data
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Column '{column}' not found in {file} (available: {available})")]
    MissingColumn {
        column: String,
        file: String,
        available: String,
    },

    #[error("{path} and {others} would both write {output}")]
    OutputCollision {
        path: PathBuf,
        output: PathBuf,
        others: String,
    },

    #[error("Failed to read reference file {path}: {message}")]
    Reference { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Errors raised by a transform while processing a segment
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{transform}: column '{column}' is missing from the segment")]
    MissingColumn { transform: String, column: String },

    #[error("{transform}: {message}")]
    Failed { transform: String, message: String },
}

/// Errors raised while writing output
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write CSV to {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to persist {path}: {message}")]
    Persist { path: PathBuf, message: String },

    #[error("Routing column '{0}' is not in the output")]
    MissingColumn(String),
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SinkError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        SinkError::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the checkpoint store
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write checkpoint {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Coarse classification used in logs and run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Read,
    Config,
    Transform,
    Write,
    Checkpoint,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Read => write!(f, "read"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Transform => write!(f, "transform"),
            ErrorKind::Write => write!(f, "write"),
            ErrorKind::Checkpoint => write!(f, "checkpoint"),
        }
    }
}

/// Any fault that aborts processing of a single input file
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Read failed")]
    Read(#[from] SourceError),

    #[error("Config failed")]
    Config(#[from] ConfigError),

    #[error("Transform failed")]
    Transform(#[from] TransformError),

    #[error("Write failed")]
    Write(#[from] SinkError),

    #[error("Checkpoint failed")]
    Checkpoint(#[from] CheckpointError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Read(_) => ErrorKind::Read,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Transform(_) => ErrorKind::Transform,
            PipelineError::Write(_) => ErrorKind::Write,
            PipelineError::Checkpoint(_) => ErrorKind::Checkpoint,
        }
    }
}

/// Render an error with its full `source()` chain, outermost first
pub fn cause_chain<E>(err: E) -> String
where
    E: std::error::Error + Send + Sync + 'static,
{
    format!("{:#}", anyhow::Error::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err: PipelineError = SourceError::MissingHeader {
            path: PathBuf::from("a.csv"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Read);

        let err: PipelineError = ConfigError::Invalid("bad".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err: PipelineError = TransformError::MissingColumn {
            transform: "filter".to_string(),
            column: "dob".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Transform);
    }

    #[test]
    fn test_cause_chain_includes_io_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PipelineError = SinkError::io("out/a.csv", io).into();
        let rendered = cause_chain(err);
        assert!(rendered.contains("out/a.csv"));
        assert!(rendered.contains("denied"));
    }
}
