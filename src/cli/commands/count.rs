//! Count command implementation

use std::path::Path;

use crate::cli::error::CliError;
use crate::source::{self, EncodingChoice, SourceFormat, SourceOptions};

/// Print and return the number of data records in `path`
pub fn handle_count(
    path: &Path,
    format: SourceFormat,
    encoding: EncodingChoice,
) -> Result<u64, CliError> {
    if !path.is_file() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    let options = SourceOptions {
        format,
        encoding,
        ..SourceOptions::default()
    };
    let rows = source::count_rows(path, &options)?;
    println!("{}", rows);
    Ok(rows)
}
