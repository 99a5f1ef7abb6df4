//! Job configuration file support
//!
//! A job is described by a `tabflow.toml` file: where inputs come from, which
//! steps run on every segment, how output is routed and where run state lives.
//! Relative paths are resolved against the directory holding the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::join::JoinMode;
use crate::reference;
use crate::sink::DEFAULT_BLANK_CATEGORY;
use crate::source::{DEFAULT_CHUNK_SIZE, EncodingChoice, SourceFormat, SourceOptions};
use crate::transform::FilterSlot;

/// Default job filename
pub const CONFIG_FILENAME: &str = "tabflow.toml";

/// Environment variable overriding `input.chunk_size`
pub const ENV_CHUNK_SIZE: &str = "TABFLOW_CHUNK_SIZE";

/// Environment variable overriding `state.dir`
pub const ENV_STATE_DIR: &str = "TABFLOW_STATE_DIR";

/// Environment variable overriding `state.log_dir`
pub const ENV_LOG_DIR: &str = "TABFLOW_LOG_DIR";

/// Environment variable overriding `output.dir`
pub const ENV_OUTPUT_DIR: &str = "TABFLOW_OUTPUT_DIR";

/// Input discovery and parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSection {
    #[serde(default = "default_input_dir")]
    pub dir: PathBuf,

    /// Glob matched inside `dir`
    #[serde(default = "default_pattern")]
    pub pattern: String,

    #[serde(default)]
    pub format: SourceFormat,

    /// `auto` or an encoding label such as `utf-8` or `windows-1252`
    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_pattern() -> String {
    "*.csv".to_string()
}

fn default_encoding() -> String {
    "auto".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            dir: default_input_dir(),
            pattern: default_pattern(),
            format: SourceFormat::default(),
            encoding: default_encoding(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// How transformed rows are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// `<dir>/<file>`
    #[default]
    Single,
    /// `<dir>/<value of column>/<file>`
    SplitColumn,
    /// `<dir>/<category>/<file>` for every reference category listing the value
    SplitReference,
    /// `<dir>/<file stem>/<n>.csv` with at most `rows_per_part` rows each
    SplitRows,
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "single" => Ok(OutputMode::Single),
            "split_column" => Ok(OutputMode::SplitColumn),
            "split_reference" => Ok(OutputMode::SplitReference),
            "split_rows" => Ok(OutputMode::SplitRows),
            _ => Err(format!(
                "Unknown output mode: {}. Use 'single', 'split_column', 'split_reference' or 'split_rows'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputMode::Single => write!(f, "single"),
            OutputMode::SplitColumn => write!(f, "split_column"),
            OutputMode::SplitReference => write!(f, "split_reference"),
            OutputMode::SplitRows => write!(f, "split_rows"),
        }
    }
}

/// Output routing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub mode: OutputMode,

    /// Routing column for the split modes
    #[serde(default)]
    pub column: Option<String>,

    /// Category reference (JSON object or CSV) for `split_reference`
    #[serde(default)]
    pub reference: Option<PathBuf>,

    #[serde(default)]
    pub rows_per_part: Option<usize>,

    /// Directory for rows whose split value is empty
    #[serde(default = "default_blank_category")]
    pub blank_category: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_blank_category() -> String {
    DEFAULT_BLANK_CATEGORY.to_string()
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            mode: OutputMode::default(),
            column: None,
            reference: None,
            rows_per_part: None,
            blank_category: default_blank_category(),
        }
    }
}

/// Checkpoint and log locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSection {
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".tabflow")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".tabflow/logs")
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            log_dir: default_log_dir(),
        }
    }
}

/// A column list given inline or as a JSON array file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnsStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_file: Option<PathBuf>,
}

impl ColumnsStep {
    pub fn inline(columns: Vec<String>) -> Self {
        Self {
            columns: Some(columns),
            columns_file: None,
        }
    }

    /// The column list, reading `columns_file` relative to `base`
    pub fn resolve(&self, base: &Path) -> Result<Vec<String>, ConfigError> {
        match (&self.columns, &self.columns_file) {
            (Some(columns), None) => Ok(columns.clone()),
            (None, Some(file)) => reference::load_value_list(&resolve_path(base, file)),
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "give either `columns` or `columns_file`, not both".to_string(),
            )),
            (None, None) => Err(ConfigError::Invalid(
                "a column step needs `columns` or `columns_file`".to_string(),
            )),
        }
    }
}

/// Keep rows strictly older than `older_than`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeRule {
    pub column: String,
    pub older_than: i32,
    /// Defaults to the current calendar year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_year: Option<i32>,
}

/// Case-insensitive membership in a value list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesRule {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_file: Option<PathBuf>,
    /// Keep the rows that do not match
    #[serde(default)]
    pub reverse: bool,
}

impl ValuesRule {
    pub fn resolve_values(&self, base: &Path) -> Result<Vec<String>, ConfigError> {
        match (&self.values, &self.values_file) {
            (Some(values), None) => Ok(values.clone()),
            (None, Some(file)) => reference::load_value_list(&resolve_path(base, file)),
            _ => Err(ConfigError::Invalid(format!(
                "values filter on '{}' needs exactly one of `values` or `values_file`",
                self.column
            ))),
        }
    }
}

/// Exact, case-sensitive allow-list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRule {
    pub column: String,
    pub allowed: Vec<String>,
}

/// Combined filter; an omitted table is an absent filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStep {
    #[serde(default)]
    pub age: FilterSlot<AgeRule>,
    #[serde(default)]
    pub values: FilterSlot<ValuesRule>,
    #[serde(default)]
    pub country: FilterSlot<CountryRule>,
}

/// One right-hand table of a join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinTable {
    pub path: PathBuf,
    /// Key column in the reference table
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinStepConfig {
    /// `inner` or `left`; required
    pub mode: JoinMode,
    /// Key column in the input files
    pub left_column: String,
    pub tables: Vec<JoinTable>,
}

/// A pipeline step, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepConfig {
    Filter(FilterStep),
    DropColumns(ColumnsStep),
    ReorderColumns(ColumnsStep),
    RemoveAllNull(ColumnsStep),
    Join(JoinStepConfig),
}

impl StepConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StepConfig::Filter(_) => "filter",
            StepConfig::DropColumns(_) => "drop_columns",
            StepConfig::ReorderColumns(_) => "reorder_columns",
            StepConfig::RemoveAllNull(_) => "remove_all_null",
            StepConfig::Join(_) => "join",
        }
    }
}

/// Per-file column aliases: logical name used in steps -> column in that file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileOverride {
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

/// Main configuration structure, the `tabflow.toml` format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Pipeline name; keys the checkpoint and log files
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub input: InputSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub state: StateSection,

    #[serde(default)]
    pub steps: Vec<StepConfig>,

    #[serde(default)]
    pub files: BTreeMap<String, FileOverride>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_name() -> String {
    "tabflow".to_string()
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            input: InputSection::default(),
            output: OutputSection::default(),
            state: StateSection::default(),
            steps: Vec::new(),
            files: BTreeMap::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl JobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a job file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Io(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| {
            ConfigError::Io(format!("Failed to write config {}: {}", path.display(), e))
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))
    }

    /// Apply `TABFLOW_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(size) = lookup(ENV_CHUNK_SIZE)
            && let Ok(size) = size.trim().parse()
        {
            self.input.chunk_size = size;
        }
        if let Some(dir) = lookup(ENV_STATE_DIR) {
            self.state.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.state.log_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(dir);
        }
    }

    /// Check the settings that cannot be checked against a file's columns
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) {
            return invalid(format!("name '{}' must be a plain file name", self.name));
        }
        if self.input.chunk_size == 0 {
            return invalid("input.chunk_size must be at least 1".to_string());
        }
        EncodingChoice::from_label(&self.input.encoding)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        match self.output.mode {
            OutputMode::Single => {}
            OutputMode::SplitColumn if self.output.column.is_none() => {
                return invalid("output.mode = \"split_column\" needs output.column".to_string());
            }
            OutputMode::SplitReference
                if self.output.column.is_none() || self.output.reference.is_none() =>
            {
                return invalid(
                    "output.mode = \"split_reference\" needs output.column and output.reference"
                        .to_string(),
                );
            }
            OutputMode::SplitRows if !matches!(self.output.rows_per_part, Some(n) if n > 0) => {
                return invalid(
                    "output.mode = \"split_rows\" needs output.rows_per_part >= 1".to_string(),
                );
            }
            _ => {}
        }

        for (i, step) in self.steps.iter().enumerate() {
            match step {
                StepConfig::Join(join) if join.tables.is_empty() => {
                    return invalid(format!("step {} (join) lists no tables", i + 1));
                }
                StepConfig::Filter(filter)
                    if !filter.age.is_active()
                        && !filter.values.is_active()
                        && !filter.country.is_active() =>
                {
                    tracing::warn!(step = i + 1, "Filter step has no active filters");
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolve a configured path against the job file's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_path(&self.base_dir, path)
    }

    pub fn input_dir(&self) -> PathBuf {
        self.resolve(&self.input.dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.resolve(&self.state.dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.state.log_dir)
    }

    pub fn source_options(&self) -> Result<SourceOptions, ConfigError> {
        let encoding = EncodingChoice::from_label(&self.input.encoding)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(SourceOptions {
            chunk_size: self.input.chunk_size,
            format: self.input.format,
            encoding,
            ..SourceOptions::default()
        })
    }

    /// Aliases for one input file name, if any
    pub fn aliases_for(&self, file_name: &str) -> Option<&BTreeMap<String, String>> {
        self.files.get(file_name).map(|o| &o.columns)
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Generate a sample job file
pub fn sample_config() -> &'static str {
    r#"# tabflow job configuration
# Pipeline name: keys the checkpoint (<state.dir>/<name>.checkpoint.json) and log file.
name = "people"

[input]
dir = "input"
pattern = "*.csv"
# "auto" (by extension), "csv" or "json" (JSON lines)
format = "auto"
# "auto" sniffs a BOM, then UTF-8, then falls back to windows-1252
encoding = "auto"
chunk_size = 10000

[output]
dir = "output"
# "single", "split_column", "split_reference" or "split_rows"
mode = "split_column"
column = "ethnicity"
blank_category = "_blank"

[state]
dir = ".tabflow"
log_dir = ".tabflow/logs"

# Steps run in order on every segment.
[[steps]]
kind = "filter"

# Keep rows strictly older than `older_than` years
[steps.age]
column = "dob"
older_than = 18

[steps.values]
column = "surname"
values = ["Smith", "Jones"]
# values_file = "reference/surnames.json"
reverse = false

[[steps]]
kind = "remove_all_null"
columns = ["email", "phone"]

[[steps]]
kind = "drop_columns"
columns = ["internal_id"]

# [[steps]]
# kind = "join"
# mode = "inner"
# left_column = "id"
# tables = [{ path = "reference/addresses.csv", column = "person_id" }]

[[steps]]
kind = "reorder_columns"
columns = ["name", "surname", "dob", "email", "phone", "ethnicity"]

# Per-file column aliases: steps refer to "dob", this file calls it "DateOfBirth"
[files."legacy.csv".columns]
dob = "DateOfBirth"
"#
}
