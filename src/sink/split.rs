//! Category splitting: rows fan out to `<out>/<category>/<file name>`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{OutputSink, append_rows, sanitize_category};
use crate::error::SinkError;
use crate::reference::CategoryMap;
use crate::segment::{Row, Segment};

/// Remove `<out_dir>/*/<file_name>` left by an earlier attempt
fn clean_previous_output(out_dir: &Path, file_name: &Path) -> Result<(), SinkError> {
    let entries = match fs::read_dir(out_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SinkError::io(out_dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| SinkError::io(out_dir, e))?;
        let candidate = entry.path().join(file_name);
        if entry.path().is_dir() && candidate.is_file() {
            fs::remove_file(&candidate).map_err(|e| SinkError::io(&candidate, e))?;
            debug!(path = %candidate.display(), "Removed previous split output");
        }
    }
    Ok(())
}

fn column_index(segment: &Segment, column: &str) -> Result<usize, SinkError> {
    segment
        .column_index(column)
        .ok_or_else(|| SinkError::MissingColumn(column.to_string()))
}

/// Group rows by a column's value. Null values go to the blank category.
pub struct SplitByColumnSink {
    out_dir: PathBuf,
    file_name: PathBuf,
    column: String,
    blank_category: String,
}

impl SplitByColumnSink {
    pub fn new(out_dir: PathBuf, file_name: PathBuf, column: String, blank_category: String) -> Self {
        Self {
            out_dir,
            file_name,
            column,
            blank_category,
        }
    }
}

impl OutputSink for SplitByColumnSink {
    fn begin(&mut self) -> Result<(), SinkError> {
        clean_previous_output(&self.out_dir, &self.file_name)
    }

    fn write_segment(&mut self, segment: &Segment) -> Result<u64, SinkError> {
        let idx = column_index(segment, &self.column)?;
        let mut written = 0;
        for (value, rows) in segment.group_by(idx) {
            let category = sanitize_category(&value.as_text(), &self.blank_category);
            let dest = self.out_dir.join(category).join(&self.file_name);
            written += append_rows(&dest, segment.columns(), rows)?;
        }
        Ok(written)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.out_dir
    }
}

/// Route each row to every category whose reference values contain the
/// row's column value (exact match). Rows matching no category are not written.
pub struct SplitByReferenceSink {
    out_dir: PathBuf,
    file_name: PathBuf,
    column: String,
    categories: Arc<CategoryMap>,
    blank_category: String,
}

impl SplitByReferenceSink {
    pub fn new(
        out_dir: PathBuf,
        file_name: PathBuf,
        column: String,
        categories: Arc<CategoryMap>,
        blank_category: String,
    ) -> Self {
        Self {
            out_dir,
            file_name,
            column,
            categories,
            blank_category,
        }
    }
}

impl OutputSink for SplitByReferenceSink {
    fn begin(&mut self) -> Result<(), SinkError> {
        clean_previous_output(&self.out_dir, &self.file_name)
    }

    fn write_segment(&mut self, segment: &Segment) -> Result<u64, SinkError> {
        let idx = column_index(segment, &self.column)?;

        let mut order: Vec<&str> = Vec::new();
        let mut buckets: HashMap<&str, Vec<&Row>> = HashMap::new();
        for row in segment.rows() {
            for category in self.categories.categories_for(&row[idx]) {
                buckets
                    .entry(category)
                    .or_insert_with(|| {
                        order.push(category);
                        Vec::new()
                    })
                    .push(row);
            }
        }

        let mut written = 0;
        for category in order {
            let rows = buckets.remove(category).unwrap_or_default();
            let dest = self
                .out_dir
                .join(sanitize_category(category, &self.blank_category))
                .join(&self.file_name);
            written += append_rows(&dest, segment.columns(), rows)?;
        }
        Ok(written)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.out_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Value;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn segment(rows: &[(&str, &str)]) -> Segment {
        Segment::from_rows(
            vec!["id".into(), "group".into()],
            rows.iter()
                .map(|(id, g)| vec![Value::from(*id), Value::from_field(g)])
                .collect(),
        )
    }

    #[test]
    fn test_split_by_column_header_once_across_segments() {
        let dir = TempDir::new().unwrap();
        let mut sink = SplitByColumnSink::new(
            dir.path().to_path_buf(),
            PathBuf::from("in.csv"),
            "group".into(),
            "_blank".into(),
        );
        sink.begin().unwrap();
        sink.write_segment(&segment(&[("1", "a"), ("2", "b")])).unwrap();
        sink.write_segment(&segment(&[("3", "a"), ("4", "")])).unwrap();
        sink.write_segment(&segment(&[("5", "a")])).unwrap();

        let a = fs::read_to_string(dir.path().join("a").join("in.csv")).unwrap();
        assert_eq!(a, "id,group\n1,a\n3,a\n5,a\n");
        let blank = fs::read_to_string(dir.path().join("_blank").join("in.csv")).unwrap();
        assert_eq!(blank, "id,group\n4,\n");
    }

    #[test]
    fn test_begin_removes_previous_attempt_only_for_this_file() {
        let dir = TempDir::new().unwrap();
        let cat = dir.path().join("a");
        fs::create_dir_all(&cat).unwrap();
        fs::write(cat.join("in.csv"), "id,group\n9,a\n").unwrap();
        fs::write(cat.join("other.csv"), "id,group\n8,a\n").unwrap();

        let mut sink = SplitByColumnSink::new(
            dir.path().to_path_buf(),
            PathBuf::from("in.csv"),
            "group".into(),
            "_blank".into(),
        );
        sink.begin().unwrap();
        sink.write_segment(&segment(&[("1", "a")])).unwrap();

        assert_eq!(
            fs::read_to_string(cat.join("in.csv")).unwrap(),
            "id,group\n1,a\n"
        );
        assert!(cat.join("other.csv").exists());
    }

    #[test]
    fn test_split_by_reference_routes_to_every_match() {
        let dir = TempDir::new().unwrap();
        let categories = CategoryMap::new(vec![
            ("x".to_string(), HashSet::from(["a".to_string()])),
            ("y".to_string(), HashSet::from(["a".to_string(), "b".to_string()])),
        ]);
        let mut sink = SplitByReferenceSink::new(
            dir.path().to_path_buf(),
            PathBuf::from("in.csv"),
            "group".into(),
            Arc::new(categories),
            "_blank".into(),
        );
        sink.begin().unwrap();
        let written = sink
            .write_segment(&segment(&[("1", "a"), ("2", "b"), ("3", "c")]))
            .unwrap();
        assert_eq!(written, 3);

        let x = fs::read_to_string(dir.path().join("x").join("in.csv")).unwrap();
        assert_eq!(x, "id,group\n1,a\n");
        let y = fs::read_to_string(dir.path().join("y").join("in.csv")).unwrap();
        assert_eq!(y, "id,group\n1,a\n2,b\n");
    }

    #[test]
    fn test_split_by_reference_uses_configured_blank_category() {
        let dir = TempDir::new().unwrap();
        let categories =
            CategoryMap::new(vec![(" ".to_string(), HashSet::from(["a".to_string()]))]);
        let mut sink = SplitByReferenceSink::new(
            dir.path().to_path_buf(),
            PathBuf::from("in.csv"),
            "group".into(),
            Arc::new(categories),
            "unnamed".into(),
        );
        sink.begin().unwrap();
        sink.write_segment(&segment(&[("1", "a")])).unwrap();

        let unnamed = fs::read_to_string(dir.path().join("unnamed").join("in.csv")).unwrap();
        assert_eq!(unnamed, "id,group\n1,a\n");
        assert!(!dir.path().join("_blank").exists());
    }

    #[test]
    fn test_missing_split_column() {
        let dir = TempDir::new().unwrap();
        let mut sink = SplitByColumnSink::new(
            dir.path().to_path_buf(),
            PathBuf::from("in.csv"),
            "nope".into(),
            "_blank".into(),
        );
        assert!(matches!(
            sink.write_segment(&segment(&[("1", "a")])),
            Err(SinkError::MissingColumn(_))
        ));
    }
}
