//! Split one input into numbered parts of at most N rows: `<out>/<stem>/<n>.csv`

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};

use super::OutputSink;
use crate::error::SinkError;
use crate::segment::Segment;

pub struct PartsSink {
    dir: PathBuf,
    rows_per_part: usize,
    current: Option<(PathBuf, Writer<BufWriter<File>>)>,
    rows_in_part: usize,
    parts: usize,
    columns: Vec<String>,
}

impl PartsSink {
    pub fn new(out_dir: &Path, input: &Path, rows_per_part: usize) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "part".to_string());
        Self {
            dir: out_dir.join(stem),
            rows_per_part: rows_per_part.max(1),
            current: None,
            rows_in_part: 0,
            parts: 0,
            columns: Vec::new(),
        }
    }

    /// Parts started so far
    pub fn parts(&self) -> usize {
        self.parts
    }

    fn close_current(&mut self) -> Result<(), SinkError> {
        if let Some((path, mut writer)) = self.current.take() {
            writer.flush().map_err(|e| SinkError::io(&path, e))?;
        }
        Ok(())
    }

    fn start_part(&mut self) -> Result<(), SinkError> {
        self.close_current()?;
        self.parts += 1;
        self.rows_in_part = 0;
        let path = self.dir.join(format!("{}.csv", self.parts));
        let file = File::create(&path).map_err(|e| SinkError::io(&path, e))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer
            .write_record(&self.columns)
            .map_err(|e| SinkError::csv(&path, e))?;
        self.current = Some((path, writer));
        Ok(())
    }
}

impl OutputSink for PartsSink {
    fn begin(&mut self) -> Result<(), SinkError> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).map_err(|e| SinkError::io(&self.dir, e))?;
        }
        fs::create_dir_all(&self.dir).map_err(|e| SinkError::io(&self.dir, e))?;
        self.parts = 0;
        self.rows_in_part = 0;
        Ok(())
    }

    fn write_segment(&mut self, segment: &Segment) -> Result<u64, SinkError> {
        self.columns = segment.columns().to_vec();
        for row in segment.rows() {
            if self.current.is_none() || self.rows_in_part >= self.rows_per_part {
                self.start_part()?;
            }
            if let Some((path, writer)) = self.current.as_mut() {
                writer
                    .write_record(row.iter().map(|v| v.as_text()))
                    .map_err(|e| SinkError::csv(path.as_path(), e))?;
            }
            self.rows_in_part += 1;
        }
        Ok(segment.len() as u64)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        // An input with no rows still gets a header-only first part
        if self.parts == 0 {
            self.start_part()?;
        }
        self.close_current()
    }

    fn destination(&self) -> &Path {
        &self.dir
    }
}
