//! Output strategies
//!
//! A sink is created for one input file. The runner calls [`OutputSink::begin`]
//! once before the first segment, which removes whatever an earlier,
//! interrupted attempt at the same file left behind. Segments are then written
//! in source order and [`OutputSink::finish`] makes the output final.

pub mod append;
pub mod combine;
pub mod parts;
pub mod single;
pub mod split;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::segment::Segment;

pub use append::append_rows;
pub use combine::{CombineReport, combine_directory};
pub use parts::PartsSink;
pub use single::{AtomicCsvWriter, SingleFileSink};
pub use split::{SplitByColumnSink, SplitByReferenceSink};

/// Default directory for rows whose split value is null
pub const DEFAULT_BLANK_CATEGORY: &str = "_blank";

pub trait OutputSink {
    /// Clear this file's destinations
    fn begin(&mut self) -> Result<(), SinkError>;

    /// Write one transformed segment, returning the rows written
    fn write_segment(&mut self, segment: &Segment) -> Result<u64, SinkError>;

    /// Make the file's output final
    fn finish(&mut self) -> Result<(), SinkError>;

    /// Where output for this file goes, for logging
    fn destination(&self) -> &Path;
}

/// Output file name for an input: JSON-lines inputs become `.csv`
pub fn output_file_name(input: &Path) -> PathBuf {
    let name = input.file_name().map(PathBuf::from).unwrap_or_default();
    match input.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => name,
        _ => name.with_extension("csv"),
    }
}

/// Inputs whose derived output names clash, each mapped to the other inputs
/// it clashes with. Names are compared case-insensitively.
pub fn output_collisions(inputs: &[PathBuf]) -> HashMap<PathBuf, Vec<PathBuf>> {
    let mut by_name: HashMap<String, Vec<&PathBuf>> = HashMap::new();
    for input in inputs {
        let name = output_file_name(input).to_string_lossy().to_lowercase();
        by_name.entry(name).or_default().push(input);
    }

    let mut collisions = HashMap::new();
    for group in by_name.values().filter(|g| g.len() > 1) {
        for input in group {
            let others = group
                .iter()
                .filter(|other| *other != input)
                .map(|other| (*other).clone())
                .collect();
            collisions.insert((*input).clone(), others);
        }
    }
    collisions
}

/// Make a category value safe as a single directory name
pub fn sanitize_category(category: &str, blank: &str) -> String {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return blank.to_string();
    }
    let mut name: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    if name.starts_with('.') {
        name.replace_range(0..1, "_");
    }
    name
}
