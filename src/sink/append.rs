//! Header-once append writes

use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::Path;

use csv::WriterBuilder;

use crate::error::SinkError;
use crate::segment::Row;

/// Append `rows` to the CSV at `dest`.
///
/// The header is written only when `dest` does not exist yet (or is empty);
/// existing content is never truncated. Parent directories are created.
/// Returns the number of rows written.
pub fn append_rows<'a>(
    dest: &Path,
    columns: &[String],
    rows: impl IntoIterator<Item = &'a Row>,
) -> Result<u64, SinkError> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
    }

    let needs_header = fs::metadata(dest).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dest)
        .map_err(|e| SinkError::io(dest, e))?;

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    if needs_header {
        writer
            .write_record(columns)
            .map_err(|e| SinkError::csv(dest, e))?;
    }

    let mut written = 0u64;
    for row in rows {
        writer
            .write_record(row.iter().map(|v| v.as_text()))
            .map_err(|e| SinkError::csv(dest, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| SinkError::io(dest, e))?;
    Ok(written)
}
