//! # Paper Match
//!
//! Reconciles a directory of PDF files, identified only by filename, against
//! bibliographic records (title, DOI) read from a tabular file or a document
//! store export.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`matching`]: Filename analysis, text normalization, directory scanning and the matching engine
//! - [`models`]: Core data structures (Record, FieldMapping, MatchOutcome, BatchResult)
//! - [`sources`]: Record sources (CSV files, JSON document exports)
//! - [`export`]: Result tables, summaries and copying of matched files
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal output

pub mod config;
pub mod export;
pub mod matching;
pub mod models;
pub mod sources;
pub mod ui;

// Re-export commonly used types
pub use matching::{FilenameAnalyzer, FileScanner, MatchingEngine, TextNormalizer};
pub use models::{BatchResult, FieldMapping, MatchOutcome, Record, RecordSet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
