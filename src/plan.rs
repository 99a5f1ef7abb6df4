//! Resolving a job into per-file plans
//!
//! A [`FilePlan`] is built once per input file, before its first segment is
//! read, and is immutable afterwards. Column names are checked here, so a file
//! that lacks a required column fails with a [`ConfigError`] before any output
//! is touched.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Datelike;
use tracing::debug;

use crate::config::{
    AgeRule, CountryRule, FileOverride, JobConfig, OutputMode, OutputSection, StepConfig,
};
use crate::error::{ConfigError, PipelineError};
use crate::join::{JoinEngine, JoinMode, JoinStep, ReferenceTable};
use crate::reference::CategoryMap;
use crate::segment::Segment;
use crate::sink::{
    OutputSink, PartsSink, SingleFileSink, SplitByColumnSink, SplitByReferenceSink,
    output_file_name,
};
use crate::source::SourceOptions;
use crate::transform::{
    AgeFilter, CountryFilter, DropColumns, FilterSlot, RemoveAllNull, RenameColumns,
    ReorderColumns, RowFilter, Transform, TransformChain, ValueSetFilter,
};

/// Everything needed to process one input file
pub struct FilePlan {
    pub transforms: TransformChain,
    pub sink: Box<dyn OutputSink>,
    /// Columns of every transformed segment
    pub output_columns: Vec<String>,
}

/// Builds the plan for one input file from its column schema
pub trait FilePlanner {
    fn plan(&self, input: &Path, columns: &[String]) -> Result<FilePlan, PipelineError>;
}

/// A step with its reference data loaded
enum PreparedStep {
    Filter {
        age: FilterSlot<AgeRule>,
        values: FilterSlot<(String, Vec<String>, bool)>,
        country: FilterSlot<CountryRule>,
    },
    Drop(Vec<String>),
    Reorder(Vec<String>),
    RemoveAllNull(Vec<String>),
    Join {
        mode: JoinMode,
        left_column: String,
        tables: Vec<Arc<ReferenceTable>>,
    },
}

/// The planner for a [`JobConfig`]. Reference files are read once, here, and
/// shared by every file of the run.
pub struct JobPlanner {
    steps: Vec<PreparedStep>,
    output: OutputSection,
    output_dir: PathBuf,
    categories: Option<Arc<CategoryMap>>,
    files: BTreeMap<String, FileOverride>,
    current_year: i32,
}

impl JobPlanner {
    pub fn new(config: &JobConfig) -> Result<Self, PipelineError> {
        let base = config.base_dir.as_path();
        let reference_options = SourceOptions {
            format: Default::default(),
            ..config.source_options()?
        };

        let mut tables: HashMap<(PathBuf, String), Arc<ReferenceTable>> = HashMap::new();
        let mut steps = Vec::with_capacity(config.steps.len());
        for step in &config.steps {
            let prepared = match step {
                StepConfig::Filter(filter) => {
                    let values = match &filter.values {
                        FilterSlot::Active(rule) => FilterSlot::Active((
                            rule.column.clone(),
                            rule.resolve_values(base)?,
                            rule.reverse,
                        )),
                        FilterSlot::Absent => FilterSlot::Absent,
                    };
                    PreparedStep::Filter {
                        age: filter.age.clone(),
                        values,
                        country: filter.country.clone(),
                    }
                }
                StepConfig::DropColumns(cols) => PreparedStep::Drop(cols.resolve(base)?),
                StepConfig::ReorderColumns(cols) => PreparedStep::Reorder(cols.resolve(base)?),
                StepConfig::RemoveAllNull(cols) => PreparedStep::RemoveAllNull(cols.resolve(base)?),
                StepConfig::Join(join) => {
                    let mut loaded = Vec::with_capacity(join.tables.len());
                    for table in &join.tables {
                        let path = config.resolve(&table.path);
                        let key = (path.clone(), table.column.clone());
                        let shared = match tables.get(&key) {
                            Some(shared) => Arc::clone(shared),
                            None => {
                                let shared = Arc::new(ReferenceTable::load(
                                    &path,
                                    &table.column,
                                    &reference_options,
                                )?);
                                tables.insert(key, Arc::clone(&shared));
                                shared
                            }
                        };
                        loaded.push(shared);
                    }
                    PreparedStep::Join {
                        mode: join.mode,
                        left_column: join.left_column.clone(),
                        tables: loaded,
                    }
                }
            };
            steps.push(prepared);
        }

        let categories = match (&config.output.mode, &config.output.reference) {
            (OutputMode::SplitReference, Some(reference)) => {
                Some(Arc::new(CategoryMap::load(&config.resolve(reference))?))
            }
            _ => None,
        };

        Ok(Self {
            steps,
            output: config.output.clone(),
            output_dir: config.output_dir(),
            categories,
            files: config.files.clone(),
            current_year: chrono::Local::now().year(),
        })
    }

    /// Pin the year age filters count from, unless a rule sets its own
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    fn build_sink(&self, input: &Path) -> Result<Box<dyn OutputSink>, ConfigError> {
        let file_name = output_file_name(input);
        let column = || {
            self.output
                .column
                .clone()
                .ok_or_else(|| ConfigError::Invalid("split output needs output.column".to_string()))
        };
        Ok(match self.output.mode {
            OutputMode::Single => Box::new(SingleFileSink::new(self.output_dir.join(file_name))),
            OutputMode::SplitColumn => Box::new(SplitByColumnSink::new(
                self.output_dir.clone(),
                file_name,
                column()?,
                self.output.blank_category.clone(),
            )),
            OutputMode::SplitReference => {
                let categories = self.categories.clone().ok_or_else(|| {
                    ConfigError::Invalid("split_reference output needs output.reference".to_string())
                })?;
                Box::new(SplitByReferenceSink::new(
                    self.output_dir.clone(),
                    file_name,
                    column()?,
                    categories,
                    self.output.blank_category.clone(),
                ))
            }
            OutputMode::SplitRows => Box::new(PartsSink::new(
                &self.output_dir,
                input,
                self.output.rows_per_part.unwrap_or(1),
            )),
        })
    }
}

fn require(schema: &[String], column: &str, file: &str) -> Result<(), ConfigError> {
    if schema.iter().any(|c| c == column) {
        Ok(())
    } else {
        Err(ConfigError::MissingColumn {
            column: column.to_string(),
            file: file.to_string(),
            available: schema.join(", "),
        })
    }
}

impl FilePlanner for JobPlanner {
    fn plan(&self, input: &Path, columns: &[String]) -> Result<FilePlan, PipelineError> {
        let file = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut chain = TransformChain::new();
        let mut schema = columns.to_vec();

        let mut push = |transform: Box<dyn Transform>,
                        schema: &mut Vec<String>|
         -> Result<(), PipelineError> {
            let shaped = transform.apply(Segment::new(std::mem::take(schema)))?;
            *schema = shaped.columns().to_vec();
            chain.push(transform);
            Ok(())
        };

        if let Some(aliases) = self.files.get(&file)
            && !aliases.columns.is_empty()
        {
            let mut renames = HashMap::new();
            for (logical, actual) in &aliases.columns {
                require(&schema, actual, &file)?;
                renames.insert(actual.clone(), logical.clone());
            }
            push(Box::new(RenameColumns::new(renames)), &mut schema)?;
        }

        for step in &self.steps {
            let transform: Box<dyn Transform> = match step {
                PreparedStep::Filter {
                    age,
                    values,
                    country,
                } => {
                    let mut filter = RowFilter::default();
                    if let FilterSlot::Active(rule) = age {
                        require(&schema, &rule.column, &file)?;
                        filter.age = FilterSlot::Active(AgeFilter {
                            column: rule.column.clone(),
                            threshold: rule.older_than,
                            current_year: rule.current_year.unwrap_or(self.current_year),
                        });
                    }
                    if let FilterSlot::Active((column, set, reverse)) = values {
                        require(&schema, column, &file)?;
                        filter.values = FilterSlot::Active(ValueSetFilter::new(
                            column.clone(),
                            set.iter().cloned(),
                            *reverse,
                        ));
                    }
                    if let FilterSlot::Active(rule) = country {
                        require(&schema, &rule.column, &file)?;
                        filter.country = FilterSlot::Active(CountryFilter::new(
                            rule.column.clone(),
                            rule.allowed.iter().cloned(),
                        ));
                    }
                    Box::new(filter)
                }
                PreparedStep::Drop(columns) => Box::new(DropColumns::new(columns.clone())),
                PreparedStep::Reorder(columns) => Box::new(ReorderColumns::new(columns.clone())),
                PreparedStep::RemoveAllNull(columns) => {
                    Box::new(RemoveAllNull::new(columns.clone()))
                }
                PreparedStep::Join {
                    mode,
                    left_column,
                    tables,
                } => {
                    require(&schema, left_column, &file)?;
                    let steps = tables
                        .iter()
                        .map(|table| JoinStep {
                            left_column: left_column.clone(),
                            table: Arc::clone(table),
                        })
                        .collect();
                    Box::new(JoinEngine::new(*mode, steps))
                }
            };
            push(transform, &mut schema)?;
        }

        if matches!(
            self.output.mode,
            OutputMode::SplitColumn | OutputMode::SplitReference
        ) && let Some(column) = &self.output.column
        {
            require(&schema, column, &file)?;
        }

        let sink = self.build_sink(input)?;
        debug!(file = %file, steps = ?chain.names(), output = %sink.destination().display(), "Planned file");
        Ok(FilePlan {
            transforms: chain,
            sink,
            output_columns: schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnsStep, FilterStep, JoinStepConfig, JoinTable, ValuesRule};
    use crate::segment::Value;
    use std::fs;
    use tempfile::TempDir;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn config_in(dir: &Path) -> JobConfig {
        JobConfig {
            base_dir: dir.to_path_buf(),
            ..JobConfig::default()
        }
    }

    #[test]
    fn test_plan_output_columns_follow_steps() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.steps = vec![
            StepConfig::DropColumns(ColumnsStep::inline(columns(&["b"]))),
            StepConfig::ReorderColumns(ColumnsStep::inline(columns(&["c", "a", "z"]))),
        ];
        let planner = JobPlanner::new(&config).unwrap();
        let plan = planner
            .plan(Path::new("in/x.csv"), &columns(&["a", "b", "c"]))
            .unwrap();
        assert_eq!(plan.output_columns, columns(&["c", "a", "z"]));
        assert_eq!(plan.sink.destination(), dir.path().join("output").join("x.csv"));
    }

    #[test]
    fn test_missing_filter_column_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.steps = vec![StepConfig::Filter(FilterStep {
            values: FilterSlot::Active(ValuesRule {
                column: "surname".into(),
                values: Some(vec!["smith".into()]),
                values_file: None,
                reverse: false,
            }),
            ..FilterStep::default()
        })];
        let planner = JobPlanner::new(&config).unwrap();
        let err = planner
            .plan(Path::new("x.csv"), &columns(&["name"]))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingColumn { .. })));
    }

    #[test]
    fn test_aliases_rename_before_steps() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.files.insert(
            "legacy.csv".to_string(),
            FileOverride {
                columns: BTreeMap::from([("dob".to_string(), "DateOfBirth".to_string())]),
            },
        );
        config.steps = vec![StepConfig::Filter(FilterStep {
            age: FilterSlot::Active(AgeRule {
                column: "dob".into(),
                older_than: 30,
                current_year: Some(2024),
            }),
            ..FilterStep::default()
        })];
        let planner = JobPlanner::new(&config).unwrap();

        let plan = planner
            .plan(Path::new("legacy.csv"), &columns(&["id", "DateOfBirth"]))
            .unwrap();
        assert_eq!(plan.output_columns, columns(&["id", "dob"]));

        let segment = Segment::from_rows(
            columns(&["id", "DateOfBirth"]),
            vec![
                vec!["1".into(), "1980-01-01".into()],
                vec!["2".into(), "2000-01-01".into()],
            ],
        );
        let out = plan.transforms.apply(segment).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(0, "id"), Some(&Value::from("1")));

        assert!(planner.plan(Path::new("other.csv"), &columns(&["id"])).is_err());
    }

    #[test]
    fn test_join_tables_load_once_and_key_checked() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("right.csv"), "key,letter\n1,a\n1,b\n2,c\n").unwrap();
        let mut config = config_in(dir.path());
        config.steps = vec![StepConfig::Join(JoinStepConfig {
            mode: JoinMode::Inner,
            left_column: "id".into(),
            tables: vec![JoinTable {
                path: PathBuf::from("right.csv"),
                column: "key".into(),
            }],
        })];
        let planner = JobPlanner::new(&config).unwrap();
        let plan = planner.plan(Path::new("l.csv"), &columns(&["id"])).unwrap();
        assert_eq!(plan.output_columns, columns(&["id", "letter"]));

        config.steps = vec![StepConfig::Join(JoinStepConfig {
            mode: JoinMode::Inner,
            left_column: "id".into(),
            tables: vec![JoinTable {
                path: PathBuf::from("right.csv"),
                column: "missing".into(),
            }],
        })];
        assert!(matches!(
            JobPlanner::new(&config),
            Err(PipelineError::Config(ConfigError::MissingColumn { .. }))
        ));
    }

    #[test]
    fn test_split_column_must_survive_steps() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.output.mode = OutputMode::SplitColumn;
        config.output.column = Some("group".into());
        config.steps = vec![StepConfig::DropColumns(ColumnsStep::inline(columns(&["group"])))];
        let planner = JobPlanner::new(&config).unwrap();
        assert!(planner
            .plan(Path::new("x.csv"), &columns(&["id", "group"]))
            .is_err());
    }
}
