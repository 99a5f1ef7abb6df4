//! Chunked input sources
//!
//! A [`ChunkSource`] streams one input file as a lazy, forward-only sequence
//! of [`Segment`]s. Every segment holds exactly `chunk_size` rows except
//! possibly the last, in source order. Sources never materialize the whole
//! file.

pub mod csv;
pub mod encoding;
pub mod jsonl;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SourceError};
use crate::segment::Segment;

pub use self::csv::CsvChunkSource;
pub use self::encoding::EncodingChoice;
pub use self::jsonl::JsonLinesChunkSource;

/// Default rows per segment
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// A file opened as a sequence of segments
pub trait ChunkSource: Iterator<Item = Result<Segment, SourceError>> {
    fn path(&self) -> &Path;

    /// Column schema fixed for every segment of this file
    fn columns(&self) -> &[String];

    /// Data records read so far
    fn rows_read(&self) -> u64;

    /// Records skipped as malformed (JSON-lines only)
    fn skipped_records(&self) -> u64 {
        0
    }

    /// Decode passes that had to substitute U+FFFD for malformed bytes
    fn decode_replacements(&self) -> u64;
}

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Decided per file from its extension
    #[default]
    Auto,
    Csv,
    #[serde(alias = "jsonl", alias = "ndjson")]
    Json,
}

impl SourceFormat {
    /// Resolve `Auto` against a file's extension
    pub fn resolve(self, path: &Path) -> Result<SourceFormat, SourceError> {
        if self != SourceFormat::Auto {
            return Ok(self);
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") | Some("txt") | Some("tsv") => Ok(SourceFormat::Csv),
            Some("json") | Some("jsonl") | Some("ndjson") => Ok(SourceFormat::Json),
            _ => Err(SourceError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SourceFormat::Auto),
            "csv" => Ok(SourceFormat::Csv),
            "json" | "jsonl" | "ndjson" => Ok(SourceFormat::Json),
            other => Err(format!("unknown input format '{}'", other)),
        }
    }
}

/// How input files are opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceOptions {
    pub chunk_size: usize,
    pub format: SourceFormat,
    pub encoding: EncodingChoice,
    pub delimiter: u8,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            format: SourceFormat::Auto,
            encoding: EncodingChoice::Auto,
            delimiter: b',',
        }
    }
}

/// Open `path` as a chunk source of the configured (or detected) format
pub fn open(path: &Path, options: &SourceOptions) -> Result<Box<dyn ChunkSource>, SourceError> {
    match options.format.resolve(path)? {
        SourceFormat::Json => Ok(Box::new(JsonLinesChunkSource::open(path, options)?)),
        _ => Ok(Box::new(CsvChunkSource::open(path, options)?)),
    }
}

/// Files in `dir` matching a glob `pattern`, sorted by path
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::Io(format!("{} is not a directory", dir.display())));
    }
    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let entries = glob::glob(&full_pattern)
        .map_err(|e| ConfigError::Invalid(format!("pattern '{}': {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Error accessing path: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// Immediate sub-directories of `dir`, sorted
pub fn discover_dirs(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::Io(format!("{}: {}", dir.display(), e)))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ConfigError::Io(format!("{}: {}", dir.display(), e)))?
            .path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Read a whole file into one segment. Only for reference tables, which are
/// held in memory by contract.
pub fn read_all(path: &Path, options: &SourceOptions) -> Result<Segment, SourceError> {
    let mut source = open(path, options)?;
    let mut all = Segment::new(source.columns().to_vec());
    for segment in source.by_ref() {
        let (_, rows) = segment?.into_parts();
        for row in rows {
            all.push_row(row);
        }
    }
    Ok(all)
}

/// Count data records without building segments.
///
/// CSV records are counted by the CSV parser so quoted newlines are handled;
/// JSON-lines files count non-blank lines.
pub fn count_rows(path: &Path, options: &SourceOptions) -> Result<u64, SourceError> {
    match options.format.resolve(path)? {
        SourceFormat::Json => {
            let file = File::open(path).map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            let mut count = 0u64;
            for (i, line) in BufReader::new(file).split(b'\n').enumerate() {
                let line = line.map_err(|source| SourceError::Io {
                    path: path.to_path_buf(),
                    line: i as u64 + 1,
                    source,
                })?;
                if !line.iter().all(u8::is_ascii_whitespace) {
                    count += 1;
                }
            }
            Ok(count)
        }
        _ => {
            let stream = encoding::open_transcoded(path, options.encoding)?;
            let mut reader = ::csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .delimiter(options.delimiter)
                .from_reader(stream);
            let mut record = ::csv::ByteRecord::new();
            let mut count = 0u64;
            loop {
                match reader.read_byte_record(&mut record) {
                    Ok(true) => count += 1,
                    Ok(false) => break,
                    Err(source) => {
                        return Err(SourceError::Csv {
                            path: path.to_path_buf(),
                            record: count + 1,
                            source,
                        });
                    }
                }
            }
            Ok(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_resolution() {
        assert_eq!(
            SourceFormat::Auto.resolve(Path::new("a.CSV")).unwrap(),
            SourceFormat::Csv
        );
        assert_eq!(
            SourceFormat::Auto.resolve(Path::new("a.ndjson")).unwrap(),
            SourceFormat::Json
        );
        assert_eq!(
            SourceFormat::Csv.resolve(Path::new("a.dat")).unwrap(),
            SourceFormat::Csv
        );
        assert!(SourceFormat::Auto.resolve(Path::new("a.parquet")).is_err());
    }

    #[test]
    fn test_count_rows_handles_quoted_newlines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "id,note\n1,\"two\nlines\"\n2,x\n").unwrap();
        assert_eq!(count_rows(&path, &SourceOptions::default()).unwrap(), 2);
    }

    #[test]
    fn test_count_rows_jsonl_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        fs::write(&path, "{\"a\":1}\n\n{\"a\":2}\n  \n").unwrap();
        assert_eq!(count_rows(&path, &SourceOptions::default()).unwrap(), 2);
    }

    #[test]
    fn test_read_all_collects_every_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ref.csv");
        fs::write(&path, "id,v\n1,a\n2,b\n3,c\n").unwrap();
        let options = SourceOptions {
            chunk_size: 1,
            ..SourceOptions::default()
        };
        let all = read_all(&path, &options).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.columns(), &["id", "v"].map(String::from)[..]);
    }

    #[test]
    fn test_discover_sorts_and_filters() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "x\n").unwrap();
        fs::write(dir.path().join("a.csv"), "x\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x\n").unwrap();
        fs::create_dir_all(dir.path().join("sub.csv")).unwrap();

        let files = discover(dir.path(), "*.csv").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(discover_dirs(dir.path()).unwrap().len(), 1);
        assert!(discover(&dir.path().join("missing"), "*").is_err());
    }

    #[test]
    fn test_open_missing_file_is_read_error() {
        let err = open(Path::new("/nonexistent/x.csv"), &SourceOptions::default());
        assert!(matches!(err, Err(SourceError::Open { .. })));
    }
}
