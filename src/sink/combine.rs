//! Concatenate every CSV in a directory into one file with a single header

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::single::AtomicCsvWriter;
use crate::error::{ConfigError, PipelineError};
use crate::segment::Value;
use crate::source::{self, SourceOptions};

/// What a directory combine produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombineReport {
    pub output: PathBuf,
    pub files: usize,
    pub rows: u64,
}

/// Combine `dir/*.csv` (sorted by name) into `dest`.
///
/// The first file fixes the column order. Later files are aligned to it by
/// name: missing columns are left blank and extra columns are dropped. The
/// destination only appears once every file has been read.
pub fn combine_directory(
    dir: &Path,
    dest: &Path,
    options: &SourceOptions,
) -> Result<CombineReport, PipelineError> {
    let files = source::discover(dir, "*.csv")?;
    if files.is_empty() {
        return Err(ConfigError::Invalid(format!("no CSV files in {}", dir.display())).into());
    }
    let mut writer = AtomicCsvWriter::new(dest)?;
    let mut columns: Option<Vec<String>> = None;
    let mut rows = 0u64;

    for file in &files {
        let mut chunks = source::open(file, options)?;
        let target = columns.get_or_insert_with(|| chunks.columns().to_vec()).clone();

        let extra: Vec<&String> = chunks
            .columns()
            .iter()
            .filter(|c| !target.contains(c))
            .collect();
        if !extra.is_empty() {
            warn!(file = %file.display(), columns = ?extra, "Dropping columns not in the first file");
        }

        if !writer.header_written() {
            writer.write_header(&target)?;
        }
        for segment in chunks.by_ref() {
            let segment = segment?.project(&target, &Value::Null);
            rows += writer.write_segment(&segment)?;
        }
    }

    let output = writer.finish()?;
    info!(dir = %dir.display(), output = %output.display(), files = files.len(), rows, "Combined directory");
    Ok(CombineReport {
        output,
        files: files.len(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_combine_aligns_columns_to_first_file() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("batch");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.csv"), "id,name\n1,x\n2,y\n").unwrap();
        fs::write(dir.join("b.csv"), "name,extra,id\nz,!,3\n").unwrap();
        fs::write(dir.join("c.csv"), "id\n4\n").unwrap();

        let dest = root.path().join("out").join("batch.csv");
        let report = combine_directory(&dir, &dest, &SourceOptions::default()).unwrap();
        assert_eq!(report.files, 3);
        assert_eq!(report.rows, 4);
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "id,name\n1,x\n2,y\n3,z\n4,\n"
        );
    }

    #[test]
    fn test_failed_combine_leaves_no_output() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("batch");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.csv"), "id\n1\n").unwrap();
        fs::write(dir.join("b.csv"), "id\n1,2,3\n").unwrap();

        let dest = root.path().join("batch.csv");
        assert!(combine_directory(&dir, &dest, &SourceOptions::default()).is_err());
        assert!(!dest.exists());
    }
}
