//! Writing match results to disk.
//!
//! A run produces, per record set, up to three CSV files under the output
//! directory:
//!
//! ```text
//! <out>/matched/<source>_matched.csv
//! <out>/unmatched/<source>_unmatched.csv
//! <out>/multi_matched/<source>_multi_matched.csv
//! ```
//!
//! [`SummaryGenerator`] then merges each category into `ALL_*.csv` at the top
//! of the output directory, and [`PdfCopier`] optionally gathers the matched
//! PDFs into one folder.

mod copier;
mod summary;
mod tables;

pub use copier::{CopyFailure, CopyStats, PdfCopier};
pub use summary::{CsvMerger, MergeOptions, SummaryCounts, SummaryGenerator};
pub use tables::CsvExporter;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::BatchResult;

pub const MATCHED_DIR: &str = "matched";
pub const UNMATCHED_DIR: &str = "unmatched";
pub const MULTI_MATCHED_DIR: &str = "multi_matched";

pub const ALL_MATCHED_FILE: &str = "ALL_MATCHED.csv";
pub const ALL_UNMATCHED_FILE: &str = "ALL_UNMATCHED.csv";
pub const ALL_MULTI_MATCHED_FILE: &str = "ALL_MULTI_MATCHED.csv";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors that can occur while exporting
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Csv(err.to_string())
    }
}

/// Files written for one batch; `None` where the category was empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportPaths {
    pub matched: Option<PathBuf>,
    pub unmatched: Option<PathBuf>,
    pub multi_matched: Option<PathBuf>,
}

impl ExportPaths {
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        [&self.matched, &self.unmatched, &self.multi_matched]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}

/// Writes the three result categories of a batch.
///
/// `headers` is the column order of the source records; each category
/// appends its own columns after them.
pub trait ResultExporter {
    fn export_matched(
        &self,
        batch: &BatchResult,
        headers: &[String],
    ) -> Result<Option<PathBuf>, ExportError>;

    fn export_unmatched(
        &self,
        batch: &BatchResult,
        headers: &[String],
    ) -> Result<Option<PathBuf>, ExportError>;

    fn export_multi_matched(
        &self,
        batch: &BatchResult,
        headers: &[String],
    ) -> Result<Option<PathBuf>, ExportError>;

    fn export_all(
        &self,
        batch: &BatchResult,
        headers: &[String],
    ) -> Result<ExportPaths, ExportError> {
        Ok(ExportPaths {
            matched: self.export_matched(batch, headers)?,
            unmatched: self.export_unmatched(batch, headers)?,
            multi_matched: self.export_multi_matched(batch, headers)?,
        })
    }
}

/// Resolver link for a DOI. Empty input gives an empty link and values that
/// already are URLs are returned unchanged.
pub fn generate_doi_url(doi: &str) -> String {
    let doi = doi.trim();
    if doi.is_empty() {
        return String::new();
    }
    if doi.starts_with("http") {
        return doi.to_string();
    }
    format!("https://doi.org/{}", doi)
}

/// Remove the category directories and summary files of a previous run.
/// Returns whether anything was removed.
pub fn clean_output_directory(dir: &Path) -> Result<bool, ExportError> {
    let mut removed = false;

    for sub in [MATCHED_DIR, UNMATCHED_DIR, MULTI_MATCHED_DIR] {
        let path = dir.join(sub);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
            tracing::info!("Removed {}", path.display());
            removed = true;
        }
    }

    for file in [ALL_MATCHED_FILE, ALL_UNMATCHED_FILE, ALL_MULTI_MATCHED_FILE] {
        let path = dir.join(file);
        if path.is_file() {
            fs::remove_file(&path)?;
            tracing::info!("Removed {}", path.display());
            removed = true;
        }
    }

    Ok(removed)
}

/// Create `path` (and its parent directories) as a CSV writer, optionally
/// starting with a UTF-8 byte order mark.
pub(crate) fn create_csv_writer(path: &Path, bom: bool) -> Result<csv::Writer<File>, ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    if bom {
        file.write_all(UTF8_BOM)?;
    }
    Ok(csv::Writer::from_writer(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_doi_url() {
        assert_eq!(generate_doi_url(""), "");
        assert_eq!(generate_doi_url("   "), "");
        assert_eq!(
            generate_doi_url(" 10.1111/isj.12345 "),
            "https://doi.org/10.1111/isj.12345"
        );
        assert_eq!(
            generate_doi_url("https://doi.org/10.1/x"),
            "https://doi.org/10.1/x"
        );
    }

    #[test]
    fn test_clean_output_directory() {
        let dir = tempdir().unwrap();
        assert!(!clean_output_directory(dir.path()).unwrap());

        fs::create_dir_all(dir.path().join(MATCHED_DIR)).unwrap();
        fs::write(dir.path().join(MATCHED_DIR).join("a_matched.csv"), "x").unwrap();
        fs::write(dir.path().join(ALL_UNMATCHED_FILE), "x").unwrap();
        fs::write(dir.path().join("keep.txt"), "x").unwrap();

        assert!(clean_output_directory(dir.path()).unwrap());
        assert!(!dir.path().join(MATCHED_DIR).exists());
        assert!(!dir.path().join(ALL_UNMATCHED_FILE).exists());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_csv_writer_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");

        let mut writer = create_csv_writer(&path, true).unwrap();
        writer.write_record(["a", "b"]).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(&bytes[3..], b"a,b\n");
    }
}
