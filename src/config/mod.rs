//! Configuration management.
//!
//! Settings are read from a TOML file and overridden by environment
//! variables prefixed with `PAPER_MATCH_`, using `__` between section and
//! key (for example `PAPER_MATCH_SCAN__RECURSIVE=false`). Command-line flags
//! take precedence over both.

mod file_config;

pub use file_config::{ConfigFile, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::matching::{DoiPrefix, FileScanner, FilenameAnalyzer};
use crate::models::FieldMapping;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PAPER_MATCH";

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "paper-match.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub copy: CopyConfig,

    #[serde(default)]
    pub fields: FieldsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Directory scanning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Descend into subdirectories of the PDF directory
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// File extension to match, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Give up scanning after this many seconds (0 disables the limit)
    #[serde(default)]
    pub timeout_seconds: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            extension: default_extension(),
            timeout_seconds: 0,
        }
    }
}

/// Matching behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Evaluate records on all cores
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Additional DOI-style filename prefixes, tried before the built-in ones
    #[serde(default)]
    pub doi_prefixes: Vec<DoiPrefix>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            doi_prefixes: Vec::new(),
        }
    }
}

/// Result files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// Start CSV files with a UTF-8 byte order mark
    #[serde(default = "default_true")]
    pub write_bom: bool,

    /// Write the ALL_*.csv summaries after the run
    #[serde(default = "default_true")]
    pub summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            write_bom: true,
            summary: true,
        }
    }
}

/// Copying matched PDFs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_copy_dir")]
    pub directory: PathBuf,

    #[serde(default)]
    pub overwrite: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_copy_dir(),
            overwrite: false,
        }
    }
}

/// Field name overrides; unset fields use the source's defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldsConfig {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub doi: Option<String>,

    #[serde(default)]
    pub uuid: Option<String>,
}

/// Logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a timestamped log file into this directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    "pdf".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./match_results")
}

fn default_copy_dir() -> PathBuf {
    PathBuf::from("./pdfs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Scan time limit, `None` when disabled
    pub fn scan_timeout(&self) -> Option<Duration> {
        (self.scan.timeout_seconds > 0).then(|| Duration::from_secs(self.scan.timeout_seconds))
    }

    pub fn scanner(&self) -> FileScanner {
        FileScanner::new()
            .extension(self.scan.extension.clone())
            .recursive(self.scan.recursive)
    }

    /// Filename analyzer with the configured extra prefixes
    pub fn analyzer(&self) -> FilenameAnalyzer {
        FilenameAnalyzer::with_extra_prefixes(self.matching.doi_prefixes.iter().cloned())
    }

    /// `base` with the configured field overrides applied
    pub fn field_mapping(&self, base: FieldMapping) -> FieldMapping {
        base.with_overrides(
            self.fields.title.clone(),
            self.fields.doi.clone(),
            self.fields.uuid.clone(),
        )
    }
}

/// Look for a config file in the working directory, then in the user
/// config directory (`<config_dir>/paper-match/config.toml`).
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paper-match").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Load configuration from `path` (or a discovered file when `None`),
/// overridden by `PAPER_MATCH_*` environment variables.
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!("Using config file {}", found.display());
                builder = builder.add_source(config::File::from(found));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
