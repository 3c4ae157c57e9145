//! Filename analysis and the record-to-file matching engine.
//!
//! - [`TextNormalizer`]: canonical lowercase keys and `#xNN;` escape removal
//! - [`FilenameAnalyzer`]: detects DOI-style vs. title-style names and derives their keys
//! - [`FileScanner`]: lists candidate files in a directory
//! - [`MatchingEngine`]: builds the title and DOI indexes and classifies every record
//!
//! # Example
//!
//! ```rust,no_run
//! use paper_match::matching::MatchingEngine;
//! use paper_match::models::{FieldMapping, Record, RecordSet};
//! use std::path::Path;
//!
//! let record: Record = [("Title", "A computer vision based concept model"), ("DOI", "")]
//!     .into_iter()
//!     .collect();
//! let records = RecordSet::new(vec![record], vec![], "papers", FieldMapping::csv());
//!
//! let batch = MatchingEngine::new().match_all(Path::new("./pdfs"), &records, true);
//! println!("{} of {} matched", batch.matched_count(), batch.total_records);
//! ```

mod engine;
mod filename;
mod normalize;
mod scanner;

pub use engine::{
    match_record, IndexedFile, KeyIndex, MatchIndex, MatchingEngine, MIN_DOI_KEY_LEN,
    MIN_TITLE_KEY_LEN,
};
pub use filename::{
    default_doi_prefixes, extract_title_part, DoiPrefix, FilenameAnalyzer, FilenameKeys,
};
pub use normalize::TextNormalizer;
pub use scanner::{bounded_scan, FileScanner, ScanInterrupted, ScannedFiles};
