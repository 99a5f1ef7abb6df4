//! Reference files: JSON value lists and category maps
//!
//! A value list is a JSON array (`["a", "b"]`), used for filter value sets and
//! column lists. A category map routes values to categories and comes either
//! from a JSON object (`{"cat": ["a", "b"]}`) or from a CSV whose header names
//! the categories and whose columns list each category's values.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::segment::Value;
use crate::source::{self, SourceFormat, SourceOptions};

fn reference_error(path: &Path, message: impl Into<String>) -> ConfigError {
    ConfigError::Reference {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| reference_error(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| reference_error(path, e.to_string()))
}

/// Scalars become their text form; nested values are rejected
fn scalar_text(path: &Path, value: serde_json::Value) -> Result<Option<String>, ConfigError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(reference_error(
            path,
            "expected a list of strings or numbers",
        )),
        scalar => Ok(Some(Value::from_json(scalar).as_text())),
    }
}

/// Load a JSON array of strings. Numbers are accepted as their text.
pub fn load_value_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    match read_json(path)? {
        serde_json::Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                if let Some(text) = scalar_text(path, item)? {
                    values.push(text);
                }
            }
            Ok(values)
        }
        _ => Err(reference_error(path, "expected a JSON array")),
    }
}

/// Categories and the exact, case-sensitive values routed to each
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMap {
    categories: Vec<(String, HashSet<String>)>,
}

impl CategoryMap {
    pub fn new(categories: Vec<(String, HashSet<String>)>) -> Self {
        Self { categories }
    }

    /// Load from a `.json` object or a `.csv` of category columns
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let is_csv = matches!(
            SourceFormat::Auto.resolve(path),
            Ok(SourceFormat::Csv)
        );
        if is_csv {
            Self::load_csv(path)
        } else {
            Self::load_json(path)
        }
    }

    fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let serde_json::Value::Object(map) = read_json(path)? else {
            return Err(reference_error(path, "expected a JSON object of category lists"));
        };
        let mut categories = Vec::with_capacity(map.len());
        for (category, values) in map {
            let serde_json::Value::Array(items) = values else {
                return Err(reference_error(
                    path,
                    format!("category '{}' is not a list", category),
                ));
            };
            let mut set = HashSet::new();
            for item in items {
                if let Some(text) = scalar_text(path, item)? {
                    set.insert(text);
                }
            }
            categories.push((category, set));
        }
        Ok(Self { categories })
    }

    fn load_csv(path: &Path) -> Result<Self, ConfigError> {
        let segment = source::read_all(path, &SourceOptions::default())
            .map_err(|e| reference_error(path, format!("{:#}", anyhow::Error::new(e))))?;
        let categories = segment
            .columns()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values = segment
                    .rows()
                    .iter()
                    .filter(|row| !row[i].is_null())
                    .map(|row| row[i].as_text())
                    .collect();
                (name.clone(), values)
            })
            .collect();
        Ok(Self { categories })
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }

    /// Every category listing this value, in map order
    pub fn categories_for<'a>(&'a self, value: &'a Value) -> impl Iterator<Item = &'a str> + 'a {
        let text = (!value.is_null()).then(|| value.as_text());
        self.categories.iter().filter_map(move |(name, values)| {
            text.as_ref()
                .filter(|t| values.contains(t.as_str()))
                .map(|_| name.as_str())
        })
    }
}
