//! tabflow - resumable, bounded-memory batch transformations for tabular files
//!
//! Provides:
//! - Chunked CSV and JSON-lines sources with encoding detection
//! - Pure segment transforms (filters, column shaping, hash joins)
//! - Output sinks (single file, split by column or reference, numbered parts)
//! - A durable per-pipeline checkpoint so interrupted runs resume
//! - A runner that isolates per-file failures

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod join;
pub mod plan;
pub mod progress;
pub mod reference;
pub mod runner;
pub mod segment;
pub mod sink;
pub mod source;
pub mod transform;

#[cfg(feature = "cli")]
pub mod cli;

pub use checkpoint::CheckpointStore;
pub use config::{JobConfig, OutputMode, StepConfig};
pub use error::{
    CheckpointError, ConfigError, ErrorKind, PipelineError, SinkError, SourceError, TransformError,
};
pub use join::{JoinEngine, JoinMode, JoinStep, ReferenceTable};
pub use plan::{FilePlan, FilePlanner, JobPlanner};
pub use reference::CategoryMap;
pub use runner::{FileReport, FileState, PipelineRunner, RunContext, RunSummary};
pub use segment::{Row, Segment, Value};
pub use sink::OutputSink;
pub use source::{ChunkSource, SourceFormat, SourceOptions};
pub use transform::{Transform, TransformChain};
