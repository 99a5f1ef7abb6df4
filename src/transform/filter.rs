//! Row filters: age threshold, value-set membership and country allow-list
//!
//! A [`RowFilter`] ANDs its enabled filters. A disabled filter is the explicit
//! [`FilterSlot::Absent`] variant and is never evaluated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Transform, age, require_column};
use crate::error::TransformError;
use crate::segment::{Segment, Value};

/// A filter that may be switched off
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<T>", into = "Option<T>")]
pub enum FilterSlot<T: Clone> {
    #[default]
    Absent,
    Active(T),
}

impl<T: Clone> From<Option<T>> for FilterSlot<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => FilterSlot::Active(inner),
            None => FilterSlot::Absent,
        }
    }
}

impl<T: Clone> From<FilterSlot<T>> for Option<T> {
    fn from(slot: FilterSlot<T>) -> Self {
        match slot {
            FilterSlot::Active(inner) => Some(inner),
            FilterSlot::Absent => None,
        }
    }
}

impl<T: Clone> FilterSlot<T> {
    pub fn is_active(&self) -> bool {
        matches!(self, FilterSlot::Active(_))
    }

    pub fn as_active(&self) -> Option<&T> {
        match self {
            FilterSlot::Active(inner) => Some(inner),
            FilterSlot::Absent => None,
        }
    }

    pub fn map<U: Clone>(self, f: impl FnOnce(T) -> U) -> FilterSlot<U> {
        match self {
            FilterSlot::Active(inner) => FilterSlot::Active(f(inner)),
            FilterSlot::Absent => FilterSlot::Absent,
        }
    }
}

/// Per-row test on a single column
pub trait ColumnPredicate {
    fn column(&self) -> &str;
    fn accepts(&self, value: &Value) -> bool;
}

/// Keep rows whose age, from a date-of-birth column, is strictly greater than
/// `threshold`. Unparseable dates have age -1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeFilter {
    pub column: String,
    pub threshold: i32,
    pub current_year: i32,
}

impl ColumnPredicate for AgeFilter {
    fn column(&self) -> &str {
        &self.column
    }

    fn accepts(&self, value: &Value) -> bool {
        age::age(&value.as_text(), self.current_year) > self.threshold
    }
}

/// Case-insensitive membership in a reference set; `reverse` keeps the
/// complement. Null never matches, so reversed filters keep null rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSetFilter {
    pub column: String,
    values: HashSet<String>,
    pub reverse: bool,
}

impl ValueSetFilter {
    pub fn new(column: impl Into<String>, values: impl IntoIterator<Item = String>, reverse: bool) -> Self {
        Self {
            column: column.into(),
            values: values.into_iter().map(|v| v.to_lowercase()).collect(),
            reverse,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ColumnPredicate for ValueSetFilter {
    fn column(&self) -> &str {
        &self.column
    }

    fn accepts(&self, value: &Value) -> bool {
        let matched = !value.is_null() && self.values.contains(&value.as_text().to_lowercase());
        matched != self.reverse
    }
}

/// Exact, case-sensitive allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryFilter {
    pub column: String,
    allowed: HashSet<String>,
}

impl CountryFilter {
    pub fn new(column: impl Into<String>, allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            column: column.into(),
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl ColumnPredicate for CountryFilter {
    fn column(&self) -> &str {
        &self.column
    }

    fn accepts(&self, value: &Value) -> bool {
        !value.is_null() && self.allowed.contains(&value.as_text())
    }
}

/// The combined filter: a row survives only if every active filter accepts it
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub age: FilterSlot<AgeFilter>,
    pub values: FilterSlot<ValueSetFilter>,
    pub country: FilterSlot<CountryFilter>,
}

impl RowFilter {
    pub fn is_noop(&self) -> bool {
        !self.age.is_active() && !self.values.is_active() && !self.country.is_active()
    }
}

fn bind<'a, P: ColumnPredicate + Clone>(
    slot: &'a FilterSlot<P>,
    segment: &Segment,
    out: &mut Vec<(usize, &'a dyn ColumnPredicate)>,
) -> Result<(), TransformError> {
    if let FilterSlot::Active(predicate) = slot {
        let idx = require_column(segment, "filter", predicate.column())?;
        out.push((idx, predicate));
    }
    Ok(())
}

impl Transform for RowFilter {
    fn name(&self) -> &str {
        "filter"
    }

    fn apply(&self, segment: Segment) -> Result<Segment, TransformError> {
        let mut active: Vec<(usize, &dyn ColumnPredicate)> = Vec::with_capacity(3);
        bind(&self.age, &segment, &mut active)?;
        bind(&self.values, &segment, &mut active)?;
        bind(&self.country, &segment, &mut active)?;
        if active.is_empty() {
            return Ok(segment);
        }
        Ok(segment.retain_rows(|row| active.iter().all(|(i, p)| p.accepts(&row[*i]))))
    }
}
