//! Segments: bounded slices of rows sharing one column schema

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Value {
    /// Build a value from a CSV field; empty fields are null
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Value::Null
        } else {
            Value::String(field.to_string())
        }
    }

    /// True for null and for the empty string
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// String form used for matching and for CSV output.
    ///
    /// Numbers with an integral value render without a fractional part, so
    /// `1`, `1.0` and `"1"` all compare equal as keys.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => normalize_number(n),
            Value::String(s) => s.clone(),
        }
    }

    /// Normalised join key: trimmed string form, case preserved. Null has no key.
    pub fn join_key(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        Some(self.as_text().trim().to_string())
    }

    /// Convert a flattened JSON scalar into a cell value
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

fn normalize_number(n: &serde_json::Number) -> String {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.is_finite()
        && f.fract() == 0.0
        && f.abs() < 1e15
    {
        return format!("{}", f as i64);
    }
    n.to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

/// A row is positional; its column names live on the owning [`Segment`]
pub type Row = Vec<Value>;

/// An ordered, finite collection of rows with a fixed column schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Segment {
    /// Create an empty segment with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a segment from columns and rows, padding or truncating rows to the schema width
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row, padding it to the schema width
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Cell lookup by row position and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Keep rows for which `keep` returns true, preserving order
    pub fn retain_rows<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&Row) -> bool,
    {
        let Segment { columns, rows } = self;
        let rows = rows.into_iter().filter(|r| keep(r)).collect();
        Segment { columns, rows }
    }

    /// Project onto `target` columns, in that order. Columns the segment lacks
    /// are created and filled with `fill`.
    pub fn project(self, target: &[String], fill: &Value) -> Self {
        let lookup: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let sources: Vec<Option<usize>> =
            target.iter().map(|c| lookup.get(c.as_str()).copied()).collect();

        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                sources
                    .iter()
                    .map(|src| match src {
                        Some(i) => std::mem::take(&mut row[*i]),
                        None => fill.clone(),
                    })
                    .collect()
            })
            .collect();

        Segment {
            columns: target.to_vec(),
            rows,
        }
    }

    /// Group rows by the text of one column, keeping first-seen group order
    /// and row order within each group
    pub fn group_by(&self, column: usize) -> Vec<(Value, Vec<&Row>)> {
        let mut groups: Vec<(Value, Vec<&Row>)> = Vec::new();
        let mut positions: HashMap<Option<String>, usize> = HashMap::new();
        for row in &self.rows {
            let value = row.get(column).cloned().unwrap_or_default();
            let key = (!value.is_null()).then(|| value.as_text());
            let slot = match positions.get(&key) {
                Some(slot) => *slot,
                None => {
                    let label = if key.is_some() { value } else { Value::Null };
                    groups.push((label, Vec::new()));
                    positions.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[slot].1.push(row);
        }
        groups
    }
}
