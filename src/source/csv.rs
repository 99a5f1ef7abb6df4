//! Streaming CSV reader producing fixed-size segments

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord};
use tracing::debug;

use super::encoding::{TranscodingReader, open_transcoded};
use super::{ChunkSource, SourceOptions};
use crate::error::SourceError;
use crate::segment::{Segment, Value};

/// CSV chunk source. The byte stream is transcoded to UTF-8 before parsing,
/// so every field reaching the CSV reader is valid text.
pub struct CsvChunkSource {
    path: PathBuf,
    reader: Reader<TranscodingReader<Box<dyn Read>>>,
    columns: Vec<String>,
    chunk_size: usize,
    record: StringRecord,
    rows_read: u64,
    done: bool,
}

impl CsvChunkSource {
    pub fn open(path: &Path, options: &SourceOptions) -> Result<Self, SourceError> {
        let stream = open_transcoded(path, options.encoding)?;
        debug!(
            file = %path.display(),
            encoding = stream.encoding().name(),
            "Opened CSV source"
        );

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(options.delimiter)
            .from_reader(stream);

        let headers = reader.headers().map_err(|source| SourceError::Csv {
            path: path.to_path_buf(),
            record: 0,
            source,
        })?;
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(SourceError::MissingHeader {
                path: path.to_path_buf(),
            });
        }
        let columns = dedupe_headers(headers.iter());

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
            chunk_size: options.chunk_size.max(1),
            record: StringRecord::new(),
            rows_read: 0,
            done: false,
        })
    }

    fn read_segment(&mut self) -> Result<Option<Segment>, SourceError> {
        let mut segment = Segment::new(self.columns.clone());
        while segment.len() < self.chunk_size {
            let more = self
                .reader
                .read_record(&mut self.record)
                .map_err(|source| SourceError::Csv {
                    path: self.path.clone(),
                    record: self.rows_read + 1,
                    source,
                })?;
            if !more {
                self.done = true;
                break;
            }
            self.rows_read += 1;
            if self.record.len() > self.columns.len() {
                return Err(SourceError::TooManyFields {
                    path: self.path.clone(),
                    record: self.rows_read,
                    expected: self.columns.len(),
                    found: self.record.len(),
                });
            }
            segment.push_row(self.record.iter().map(Value::from_field).collect());
        }
        Ok((!segment.is_empty()).then_some(segment))
    }
}

/// Repeated header names get a `.1`, `.2`... suffix so every column is addressable
fn dedupe_headers<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::new();
    for name in names {
        let mut candidate = name.to_string();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}.{}", name, n);
        }
        seen.insert(candidate.clone());
        columns.push(candidate);
    }
    columns
}

impl Iterator for CsvChunkSource {
    type Item = Result<Segment, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_segment() {
            Ok(segment) => segment.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl ChunkSource for CsvChunkSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn decode_replacements(&self) -> u64 {
        self.reader.get_ref().replacements()
    }
}
