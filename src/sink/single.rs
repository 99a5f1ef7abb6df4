//! One output file per input, persisted atomically when the file completes

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use tempfile::NamedTempFile;

use super::OutputSink;
use crate::error::SinkError;
use crate::segment::Segment;

/// Writes into a temp file next to the destination and renames it into place
/// on [`AtomicCsvWriter::finish`]. Dropping it unfinished deletes the temp file.
pub struct AtomicCsvWriter {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
    header_written: bool,
}

impl AtomicCsvWriter {
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let final_path = final_path.as_ref().to_path_buf();
        let parent = final_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;

        let temp = NamedTempFile::new_in(parent).map_err(|e| SinkError::io(parent, e))?;
        let writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(temp));
        Ok(Self {
            writer,
            final_path,
            header_written: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.final_path
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn write_header(&mut self, columns: &[String]) -> Result<(), SinkError> {
        self.writer
            .write_record(columns)
            .map_err(|e| SinkError::csv(&self.final_path, e))?;
        self.header_written = true;
        Ok(())
    }

    /// Write a segment's rows, preceded by its header on the first call
    pub fn write_segment(&mut self, segment: &Segment) -> Result<u64, SinkError> {
        if !self.header_written {
            self.write_header(segment.columns())?;
        }
        for row in segment.rows() {
            self.writer
                .write_record(row.iter().map(|v| v.as_text()))
                .map_err(|e| SinkError::csv(&self.final_path, e))?;
        }
        Ok(segment.len() as u64)
    }

    /// Flush, fsync and atomically replace the destination
    pub fn finish(self) -> Result<PathBuf, SinkError> {
        let buffered = self.writer.into_inner().map_err(|e| SinkError::Persist {
            path: self.final_path.clone(),
            message: e.error().to_string(),
        })?;
        let temp = buffered.into_inner().map_err(|e| SinkError::Persist {
            path: self.final_path.clone(),
            message: e.error().to_string(),
        })?;
        temp.as_file()
            .sync_all()
            .map_err(|e| SinkError::io(&self.final_path, e))?;
        temp.persist(&self.final_path)
            .map_err(|e| SinkError::Persist {
                path: self.final_path.clone(),
                message: e.error.to_string(),
            })?;
        Ok(self.final_path)
    }
}

/// `<out_dir>/<file name>` for one input file
pub struct SingleFileSink {
    dest: PathBuf,
    writer: Option<AtomicCsvWriter>,
}

impl SingleFileSink {
    pub fn new(dest: PathBuf) -> Self {
        Self { dest, writer: None }
    }
}

impl OutputSink for SingleFileSink {
    fn begin(&mut self) -> Result<(), SinkError> {
        if self.dest.exists() {
            fs::remove_file(&self.dest).map_err(|e| SinkError::io(&self.dest, e))?;
        }
        self.writer = Some(AtomicCsvWriter::new(&self.dest)?);
        Ok(())
    }

    fn write_segment(&mut self, segment: &Segment) -> Result<u64, SinkError> {
        if self.writer.is_none() {
            self.begin()?;
        }
        match self.writer.as_mut() {
            Some(writer) => writer.write_segment(segment),
            None => Ok(0),
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.dest
    }
}
