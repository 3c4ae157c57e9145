//! Record sources that feed the matching engine.
//!
//! This module defines the [`RecordSource`] trait. A source resolves a set of
//! inputs when it connects (one CSV file, a directory of CSV files, a JSON
//! export of a document collection...) and yields one [`RecordSet`] per input.
//!
//! # Sources
//!
//! - [`CsvSource`] - tabular exports, one record per row (`Title` / `DOI` columns by default)
//! - [`JsonSource`] - document store exports as a JSON array or JSON Lines
//!   (`label` / `doi` / `uuid` fields by default)
//!
//! # Example
//!
//! ```rust,no_run
//! use paper_match::sources::{create_source, RecordFilter, SourceKind, SourceLocation};
//!
//! # fn main() -> Result<(), paper_match::sources::SourceError> {
//! let mut source = create_source(SourceKind::Csv, SourceLocation::file("data.csv"), None)?;
//! source.connect()?;
//! for set in source.fetch_all(&RecordFilter::default())? {
//!     println!("{}: {} records", set.source_name, set.len());
//! }
//! # Ok(())
//! # }
//! ```

mod document;
mod tabular;

pub use document::JsonSource;
pub use tabular::CsvSource;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::models::{FieldMapping, Record, RecordSet};

/// The RecordSource trait defines the interface for all record inputs.
///
/// Call [`connect`](RecordSource::connect) before fetching; it resolves and
/// validates the inputs so that configuration problems surface before any
/// matching begins.
pub trait RecordSource: Send + std::fmt::Debug {
    /// Short identifier of the source type ("csv", "json")
    fn source_type(&self) -> &str;

    /// Field names used for title, DOI and uuid
    fn field_mapping(&self) -> &FieldMapping;

    /// Resolve and validate the inputs
    fn connect(&mut self) -> Result<(), SourceError>;

    /// Release resources
    fn disconnect(&mut self) {}

    /// Identifiers of every input this source can fetch
    fn available_sources(&self) -> Vec<String>;

    /// Fetch the records of one input (the first one when `identifier` is `None`)
    fn fetch(&self, identifier: Option<&str>, filter: &RecordFilter)
        -> Result<RecordSet, SourceError>;

    /// Fetch every available input
    fn fetch_all(&self, filter: &RecordFilter) -> Result<Vec<RecordSet>, SourceError> {
        self.available_sources()
            .iter()
            .map(|id| self.fetch(Some(id.as_str()), filter))
            .collect()
    }
}

/// Errors that can occur when reading records
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Missing or contradictory source configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input file or directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// `fetch` called before a successful `connect`
    #[error("Source is not connected")]
    NotConnected,

    /// Malformed CSV or JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

impl From<glob::PatternError> for SourceError {
    fn from(err: glob::PatternError) -> Self {
        SourceError::Config(format!("invalid file pattern: {}", err))
    }
}

/// Kind of record source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Json,
}

impl SourceKind {
    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::Csv => "csv",
            SourceKind::Json => "json",
        }
    }

    /// Field mapping used when none is configured
    pub fn default_mapping(&self) -> FieldMapping {
        match self {
            SourceKind::Csv => FieldMapping::csv(),
            SourceKind::Json => FieldMapping::document(),
        }
    }

    /// Glob used to pick inputs from a directory
    pub fn default_pattern(&self) -> &'static str {
        match self {
            SourceKind::Csv => "*.csv",
            SourceKind::Json => "*.json",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(SourceKind::Csv),
            "json" | "jsonl" | "mongodb" => Ok(SourceKind::Json),
            other => Err(SourceError::Config(format!(
                "unsupported source type: {}",
                other
            ))),
        }
    }
}

/// Where a source reads from: a single file, or every file in a directory
/// matching a glob pattern.
#[derive(Debug, Clone, Default)]
pub struct SourceLocation {
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub pattern: Option<String>,
}

impl SourceLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn dir(path: impl Into<PathBuf>, pattern: Option<String>) -> Self {
        Self {
            dir: Some(path.into()),
            pattern,
            ..Self::default()
        }
    }

    /// List the input files, sorted. A file takes precedence over a directory.
    pub fn resolve(&self, default_pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
        if let Some(file) = &self.file {
            if !file.is_file() {
                return Err(SourceError::NotFound(format!(
                    "file does not exist: {}",
                    file.display()
                )));
            }
            return Ok(vec![file.clone()]);
        }

        let Some(dir) = &self.dir else {
            return Err(SourceError::Config(
                "either an input file or an input directory must be given".to_string(),
            ));
        };

        if !dir.is_dir() {
            return Err(SourceError::NotFound(format!(
                "directory does not exist: {}",
                dir.display()
            )));
        }

        let pattern = self.pattern.as_deref().unwrap_or(default_pattern);
        let full_pattern = dir.join(pattern);
        let mut files: Vec<PathBuf> = glob::glob(&full_pattern.to_string_lossy())?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Resolve a fetch identifier against the configured directory
    fn locate(&self, identifier: &str) -> PathBuf {
        let path = PathBuf::from(identifier);
        match &self.dir {
            Some(dir) if path.is_relative() && !path.exists() => dir.join(path),
            _ => path,
        }
    }
}

/// Equality constraints on record fields; a record must satisfy all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    conditions: Vec<(String, String)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Parse `FIELD=VALUE` expressions
    pub fn parse<'a>(exprs: impl IntoIterator<Item = &'a str>) -> Result<Self, SourceError> {
        let mut filter = Self::new();
        for expr in exprs {
            let Some((field, value)) = expr.split_once('=') else {
                return Err(SourceError::Config(format!(
                    "filter must look like FIELD=VALUE: {}",
                    expr
                )));
            };
            let field = field.trim();
            if field.is_empty() {
                return Err(SourceError::Config(format!("filter has no field: {}", expr)));
            }
            filter = filter.with(field, value.trim());
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| record.raw(field) == value)
    }
}

/// Create a source of the given kind
pub fn create_source(
    kind: SourceKind,
    location: SourceLocation,
    field_mapping: Option<FieldMapping>,
) -> Result<Box<dyn RecordSource>, SourceError> {
    if location.file.is_none() && location.dir.is_none() {
        return Err(SourceError::Config(format!(
            "{} source needs an input file or directory",
            kind
        )));
    }

    let mapping = field_mapping.unwrap_or_else(|| kind.default_mapping());
    Ok(match kind {
        SourceKind::Csv => Box::new(CsvSource::new(location, mapping)),
        SourceKind::Json => Box::new(JsonSource::new(location, mapping)),
    })
}

/// File stem used as the record set name
fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_source_kind_from_str() {
        assert_eq!("csv".parse::<SourceKind>().unwrap(), SourceKind::Csv);
        assert_eq!("MongoDB".parse::<SourceKind>().unwrap(), SourceKind::Json);
        assert!(matches!(
            "excel".parse::<SourceKind>(),
            Err(SourceError::Config(_))
        ));
    }

    #[test]
    fn test_filter_parse_and_match() {
        let filter = RecordFilter::parse(["Year=2024", " Journal = DSS "]).unwrap();
        let record: Record = [("Year", "2024"), ("Journal", "DSS")].into_iter().collect();
        assert!(filter.matches(&record));

        let other: Record = [("Year", "2023"), ("Journal", "DSS")].into_iter().collect();
        assert!(!filter.matches(&other));

        assert!(RecordFilter::default().matches(&other));
        assert!(RecordFilter::parse(["novalue"]).is_err());
        assert!(RecordFilter::parse(["=x"]).is_err());
    }

    #[test]
    fn test_create_source_requires_location() {
        let err = create_source(SourceKind::Csv, SourceLocation::default(), None).unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[test]
    fn test_location_resolve_dir_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "Title\n").unwrap();
        fs::write(dir.path().join("a.csv"), "Title\n").unwrap();
        fs::write(dir.path().join("c.txt"), "x").unwrap();

        let files = SourceLocation::dir(dir.path(), None)
            .resolve("*.csv")
            .unwrap();
        let names: Vec<String> = files.iter().map(|p| stem_of(p)).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_location_resolve_missing() {
        let err = SourceLocation::file("/nonexistent/data.csv")
            .resolve("*.csv")
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));

        let err = SourceLocation::default().resolve("*.csv").unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }
}
