//! Column-shaping transforms

use std::collections::{HashMap, HashSet};

use super::Transform;
use crate::error::TransformError;
use crate::segment::{Segment, Value};

/// Remove named columns; names the segment lacks are ignored
#[derive(Debug, Clone)]
pub struct DropColumns {
    columns: HashSet<String>,
}

impl DropColumns {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }
}

impl Transform for DropColumns {
    fn name(&self) -> &str {
        "drop_columns"
    }

    fn apply(&self, segment: Segment) -> Result<Segment, TransformError> {
        let keep: Vec<String> = segment
            .columns()
            .iter()
            .filter(|c| !self.columns.contains(*c))
            .cloned()
            .collect();
        if keep.len() == segment.columns().len() {
            return Ok(segment);
        }
        Ok(segment.project(&keep, &Value::Null))
    }
}

/// Reindex to a target column order. Target columns the segment lacks are
/// created with empty values; columns outside the target are dropped.
#[derive(Debug, Clone)]
pub struct ReorderColumns {
    order: Vec<String>,
}

impl ReorderColumns {
    pub fn new(order: Vec<String>) -> Self {
        Self { order }
    }
}

impl Transform for ReorderColumns {
    fn name(&self) -> &str {
        "reorder_columns"
    }

    fn apply(&self, segment: Segment) -> Result<Segment, TransformError> {
        Ok(segment.project(&self.order, &Value::String(String::new())))
    }
}

/// Rename columns (`from -> to`); rows are untouched
#[derive(Debug, Clone)]
pub struct RenameColumns {
    renames: HashMap<String, String>,
}

impl RenameColumns {
    pub fn new(renames: HashMap<String, String>) -> Self {
        Self { renames }
    }
}

impl Transform for RenameColumns {
    fn name(&self) -> &str {
        "rename_columns"
    }

    fn apply(&self, segment: Segment) -> Result<Segment, TransformError> {
        let (columns, rows) = segment.into_parts();
        let columns = columns
            .into_iter()
            .map(|c| self.renames.get(&c).cloned().unwrap_or(c))
            .collect();
        Ok(Segment::from_rows(columns, rows))
    }
}

/// Remove a row only when every listed column is null for it.
/// A column missing from the segment is null for every row.
#[derive(Debug, Clone)]
pub struct RemoveAllNull {
    columns: Vec<String>,
}

impl RemoveAllNull {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl Transform for RemoveAllNull {
    fn name(&self) -> &str {
        "remove_all_null"
    }

    fn apply(&self, segment: Segment) -> Result<Segment, TransformError> {
        if self.columns.is_empty() {
            return Ok(segment);
        }
        let indices: Vec<usize> = self
            .columns
            .iter()
            .filter_map(|c| segment.column_index(c))
            .collect();
        // With no listed column present, `any` is false and every row goes
        Ok(segment.retain_rows(|row| indices.iter().any(|&i| !row[i].is_null())))
    }
}
