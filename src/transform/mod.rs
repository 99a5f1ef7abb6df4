//! Segment transforms
//!
//! Every transform is pure: it takes a [`Segment`] by value and returns the
//! transformed segment. Fan-out (splitting, writing) lives in [`crate::sink`].

pub mod age;
pub mod columns;
pub mod filter;

use crate::error::TransformError;
use crate::segment::Segment;

pub use columns::{DropColumns, RemoveAllNull, RenameColumns, ReorderColumns};
pub use filter::{AgeFilter, CountryFilter, FilterSlot, RowFilter, ValueSetFilter};

/// A row-shaping transformation applied to each segment of a file
pub trait Transform: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    fn apply(&self, segment: Segment) -> Result<Segment, TransformError>;
}

/// Transforms applied in order, each to the previous one's output
#[derive(Default)]
pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn apply(&self, segment: Segment) -> Result<Segment, TransformError> {
        self.transforms
            .iter()
            .try_fold(segment, |segment, transform| transform.apply(segment))
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChain")
            .field("transforms", &self.names())
            .finish()
    }
}

/// Look up a column a transform needs, or fail with the transform's name
pub(crate) fn require_column(
    segment: &Segment,
    transform: &str,
    column: &str,
) -> Result<usize, TransformError> {
    segment
        .column_index(column)
        .ok_or_else(|| TransformError::MissingColumn {
            transform: transform.to_string(),
            column: column.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Value;

    #[test]
    fn test_chain_applies_in_order() {
        let segment = Segment::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                vec!["1".into(), Value::Null, "x".into()],
                vec![Value::Null, Value::Null, "y".into()],
            ],
        );
        let chain = TransformChain::new()
            .with(RemoveAllNull::new(vec!["a".into(), "b".into()]))
            .with(DropColumns::new(vec!["b".into()]))
            .with(ReorderColumns::new(vec!["c".into(), "a".into()]));

        assert_eq!(chain.names(), vec!["remove_all_null", "drop_columns", "reorder_columns"]);
        let out = chain.apply(segment).unwrap();
        assert_eq!(out.columns(), &["c", "a"].map(String::from)[..]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0], vec![Value::from("x"), Value::from("1")]);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let segment = Segment::from_rows(vec!["a".into()], vec![vec!["1".into()]]);
        let out = TransformChain::new().apply(segment.clone()).unwrap();
        assert_eq!(out, segment);
    }
}
