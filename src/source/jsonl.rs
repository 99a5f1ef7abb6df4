//! JSON-lines reader: one object per line, nested objects flattened to dotted keys.
//! The schema is the key union over the whole file, found by a first pass that keeps only keys.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::Map;
use tracing::warn;

use super::encoding::{TranscodingReader, open_transcoded};
use super::{ChunkSource, SourceOptions};
use crate::error::SourceError;
use crate::segment::{Row, Segment, Value};

type Record = Vec<(String, serde_json::Value)>;

pub struct JsonLinesChunkSource {
    path: PathBuf,
    reader: BufReader<TranscodingReader<Box<dyn Read>>>,
    line: String,
    columns: Vec<String>,
    chunk_size: usize,
    line_no: u64,
    rows_read: u64,
    skipped: u64,
    done: bool,
}

impl JsonLinesChunkSource {
    /// Opens the file after a key-only pass that fixes the schema for every segment
    pub fn open(path: &Path, options: &SourceOptions) -> Result<Self, SourceError> {
        let columns = scan_columns(path, options)?;
        let stream = open_transcoded(path, options.encoding)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(stream),
            line: String::new(),
            columns,
            chunk_size: options.chunk_size.max(1),
            line_no: 0,
            rows_read: 0,
            skipped: 0,
            done: false,
        })
    }

    /// Read up to one chunk of well-formed records, skipping malformed lines
    fn read_records(&mut self) -> Result<Vec<Record>, SourceError> {
        let mut records = Vec::new();
        while records.len() < self.chunk_size {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    line: self.line_no + 1,
                    source,
                })?;
            if n == 0 {
                self.done = true;
                break;
            }
            self.line_no += 1;
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(serde_json::Value::Object(object)) => {
                    let mut record = Vec::with_capacity(object.len());
                    flatten("", object, &mut record);
                    records.push(record);
                    self.rows_read += 1;
                }
                Ok(_) => {
                    self.skipped += 1;
                    warn!(
                        file = %self.path.display(),
                        line = self.line_no,
                        "Skipping JSON line that is not an object"
                    );
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        file = %self.path.display(),
                        line = self.line_no,
                        error = %e,
                        "Skipping malformed JSON line"
                    );
                }
            }
        }
        Ok(records)
    }

    fn build_segment(&self, records: Vec<Record>) -> Segment {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let mut row: Row = vec![Value::Null; self.columns.len()];
            for (key, value) in record {
                if let Some(i) = positions.get(key.as_str()) {
                    row[*i] = Value::from_json(value);
                }
            }
            rows.push(row);
        }
        Segment::from_rows(self.columns.clone(), rows)
    }
}

/// Union of flattened keys over every object line, in first-seen order.
/// Only the key set is held; malformed lines are left for the main pass to report.
fn scan_columns(path: &Path, options: &SourceOptions) -> Result<Vec<String>, SourceError> {
    let mut reader = BufReader::new(open_transcoded(path, options.encoding)?);
    let mut line = String::new();
    let mut line_no = 0u64;
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                line: line_no + 1,
                source,
            })?;
        if n == 0 {
            break;
        }
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Ok(serde_json::Value::Object(object)) =
            serde_json::from_str::<serde_json::Value>(trimmed)
        {
            let mut record = Vec::with_capacity(object.len());
            flatten("", object, &mut record);
            for (key, _) in record {
                if !seen.contains(&key) {
                    seen.insert(key.clone());
                    columns.push(key);
                }
            }
        }
    }
    Ok(columns)
}

/// Flatten nested objects into `parent.child` keys; arrays stay as JSON values
fn flatten(prefix: &str, object: Map<String, serde_json::Value>, out: &mut Record) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            serde_json::Value::Object(inner) if !inner.is_empty() => flatten(&name, inner, out),
            other => out.push((name, other)),
        }
    }
}

impl Iterator for JsonLinesChunkSource {
    type Item = Result<Segment, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_records() {
            Ok(records) if records.is_empty() => None,
            Ok(records) => Some(Ok(self.build_segment(records))),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl ChunkSource for JsonLinesChunkSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn skipped_records(&self) -> u64 {
        self.skipped
    }

    fn decode_replacements(&self) -> u64 {
        self.reader.get_ref().replacements()
    }
}
