//! Hash joins of segments against in-memory reference tables
//!
//! Reference tables are loaded once, before any segment is processed:
//! rows with a null key are discarded, then duplicate keys are collapsed
//! keeping the first occurrence in file order. Keys compare as trimmed
//! strings with case preserved, so `1`, `1.0` and `" 1"` all match `"1"`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, PipelineError, TransformError};
use crate::segment::{Row, Segment, Value};
use crate::source::{self, SourceOptions};
use crate::transform::{Transform, require_column};

/// Inner keeps only matched left rows; left keeps every left row and leaves
/// unmatched right columns null
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    Inner,
    Left,
}

impl std::fmt::Display for JoinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinMode::Inner => write!(f, "inner"),
            JoinMode::Left => write!(f, "left"),
        }
    }
}

/// A fully materialized right-hand table, deduplicated and indexed by key
#[derive(Debug)]
pub struct ReferenceTable {
    source: PathBuf,
    key_column: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

impl ReferenceTable {
    /// Read `path` fully and index it on `key_column`
    pub fn load(
        path: &Path,
        key_column: &str,
        options: &SourceOptions,
    ) -> Result<Self, PipelineError> {
        let segment = source::read_all(path, options)?;
        let table = Self::from_segment(path, segment, key_column)?;
        info!(
            reference = %path.display(),
            key = key_column,
            rows = table.len(),
            "Loaded reference table"
        );
        Ok(table)
    }

    pub fn from_segment(
        source: &Path,
        segment: Segment,
        key_column: &str,
    ) -> Result<Self, ConfigError> {
        let key_idx = segment
            .column_index(key_column)
            .ok_or_else(|| ConfigError::MissingColumn {
                column: key_column.to_string(),
                file: source.display().to_string(),
                available: segment.columns().join(", "),
            })?;

        let (all_columns, all_rows) = segment.into_parts();
        let columns: Vec<String> = all_columns
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != key_idx)
            .map(|(_, c)| c)
            .collect();

        let mut index = HashMap::new();
        let mut rows = Vec::new();
        let (mut null_keys, mut duplicates) = (0usize, 0usize);
        for mut row in all_rows {
            let Some(key) = row[key_idx].join_key() else {
                null_keys += 1;
                continue;
            };
            if index.contains_key(&key) {
                duplicates += 1;
                continue;
            }
            row.remove(key_idx);
            index.insert(key, rows.len());
            rows.push(row);
        }
        debug!(
            reference = %source.display(),
            null_keys,
            duplicates,
            "Deduplicated reference table"
        );

        Ok(Self {
            source: source.to_path_buf(),
            key_column: key_column.to_string(),
            columns,
            rows,
            index,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Non-key columns, in file order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-key values of the first row with this key
    pub fn lookup(&self, key: &str) -> Option<&Row> {
        self.index.get(key).map(|&i| &self.rows[i])
    }
}

/// One merge: `left_column` of the running result against a table's key
#[derive(Debug, Clone)]
pub struct JoinStep {
    pub left_column: String,
    pub table: Arc<ReferenceTable>,
}

/// Sequential joins against one or more reference tables
#[derive(Debug, Clone)]
pub struct JoinEngine {
    steps: Vec<JoinStep>,
    mode: JoinMode,
}

impl JoinEngine {
    pub fn new(mode: JoinMode, steps: Vec<JoinStep>) -> Self {
        Self { steps, mode }
    }

    pub fn mode(&self) -> JoinMode {
        self.mode
    }

    fn merge(
        &self,
        segment: Segment,
        step: &JoinStep,
        ordinal: usize,
    ) -> Result<Segment, TransformError> {
        let left_idx = require_column(&segment, "join", &step.left_column)?;
        let (mut columns, rows) = segment.into_parts();

        let mut taken: HashSet<String> = columns.iter().cloned().collect();
        for name in step.table.columns() {
            let renamed = unique_name(name, ordinal, &taken);
            taken.insert(renamed.clone());
            columns.push(renamed);
        }

        let right_width = step.table.columns().len();
        let mut merged = Vec::with_capacity(rows.len());
        for mut row in rows {
            let hit = row[left_idx]
                .join_key()
                .and_then(|key| step.table.lookup(&key));
            match (hit, self.mode) {
                (Some(right), _) => {
                    row.extend(right.iter().cloned());
                    merged.push(row);
                }
                (None, JoinMode::Left) => {
                    row.extend(std::iter::repeat_n(Value::Null, right_width));
                    merged.push(row);
                }
                (None, JoinMode::Inner) => {}
            }
        }
        Ok(Segment::from_rows(columns, merged))
    }
}

/// `name`, or `name_<ordinal>` (then `_2`, `_3`...) when already taken
fn unique_name(name: &str, ordinal: usize, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let base = format!("{}_{}", name, ordinal);
    let mut candidate = base.clone();
    let mut n = 1;
    while taken.contains(&candidate) {
        n += 1;
        candidate = format!("{}_{}", base, n);
    }
    candidate
}

impl Transform for JoinEngine {
    fn name(&self) -> &str {
        "join"
    }

    fn apply(&self, segment: Segment) -> Result<Segment, TransformError> {
        self.steps
            .iter()
            .enumerate()
            .try_fold(segment, |acc, (i, step)| self.merge(acc, step, i + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left() -> Segment {
        Segment::from_rows(
            vec!["id".into(), "name".into()],
            vec![
                vec!["1".into(), "one".into()],
                vec!["2".into(), "two".into()],
                vec!["3".into(), "three".into()],
            ],
        )
    }

    fn table(columns: &[&str], rows: Vec<Row>, key: &str) -> Arc<ReferenceTable> {
        let segment = Segment::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows);
        Arc::new(ReferenceTable::from_segment(Path::new("right.csv"), segment, key).unwrap())
    }

    fn letters() -> Arc<ReferenceTable> {
        table(
            &["key", "letter"],
            vec![
                vec!["1".into(), "a".into()],
                vec!["1".into(), "b".into()],
                vec!["2".into(), "c".into()],
            ],
            "key",
        )
    }

    #[test]
    fn test_inner_join_dedups_keep_first() {
        let engine = JoinEngine::new(
            JoinMode::Inner,
            vec![JoinStep {
                left_column: "id".into(),
                table: letters(),
            }],
        );
        let out = engine.apply(left()).unwrap();
        assert_eq!(out.columns(), &["id", "name", "letter"].map(String::from)[..]);
        let pairs: Vec<(String, String)> = out
            .rows()
            .iter()
            .map(|r| (r[0].as_text(), r[2].as_text()))
            .collect();
        assert_eq!(
            pairs,
            vec![("1".into(), "a".into()), ("2".into(), "c".into())]
        );
    }

    #[test]
    fn test_left_join_keeps_unmatched_with_nulls() {
        let engine = JoinEngine::new(
            JoinMode::Left,
            vec![JoinStep {
                left_column: "id".into(),
                table: letters(),
            }],
        );
        let out = engine.apply(left()).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.get(2, "letter").unwrap().is_null());
    }

    #[test]
    fn test_null_right_keys_are_discarded() {
        let t = table(
            &["key", "v"],
            vec![vec![Value::Null, "x".into()], vec!["".into(), "y".into()]],
            "key",
        );
        assert!(t.is_empty());
    }

    #[test]
    fn test_numeric_keys_match_strings() {
        let t = table(
            &["key", "v"],
            vec![vec![Value::from(2i64), "num".into()]],
            "key",
        );
        let engine = JoinEngine::new(
            JoinMode::Inner,
            vec![JoinStep {
                left_column: "id".into(),
                table: t,
            }],
        );
        let out = engine.apply(left()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(0, "name"), Some(&Value::from("two")));
    }

    #[test]
    fn test_sequential_joins_rename_collisions_and_drop_keys() {
        let second = table(
            &["ref", "letter", "name"],
            vec![vec!["1".into(), "z".into(), "uno".into()]],
            "ref",
        );
        let engine = JoinEngine::new(
            JoinMode::Left,
            vec![
                JoinStep {
                    left_column: "id".into(),
                    table: letters(),
                },
                JoinStep {
                    left_column: "id".into(),
                    table: second,
                },
            ],
        );
        let out = engine.apply(left()).unwrap();
        assert_eq!(
            out.columns(),
            &["id", "name", "letter", "letter_2", "name_2"].map(String::from)[..]
        );
        assert_eq!(out.get(0, "letter_2"), Some(&Value::from("z")));
        assert_eq!(out.get(0, "name_2"), Some(&Value::from("uno")));
    }

    #[test]
    fn test_missing_key_column_is_config_error() {
        let segment = Segment::from_rows(vec!["a".into()], vec![]);
        let err = ReferenceTable::from_segment(Path::new("r.csv"), segment, "id").unwrap_err();
        assert!(matches!(err, ConfigError::MissingColumn { .. }));
    }

    #[test]
    fn test_unique_name_suffixes() {
        let taken: HashSet<String> = ["a", "a_1", "a_1_2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_name("b", 1, &taken), "b");
        assert_eq!(unique_name("a", 1, &taken), "a_1_3");
        assert_eq!(unique_name("a", 2, &taken), "a_2");
    }
}
