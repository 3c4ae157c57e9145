//! Directory scanning for candidate files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

/// Base name (file name without extension) to file location.
///
/// When two files share a base name the one visited last wins. Directory
/// entries are visited in file-name order, so the outcome is stable.
pub type ScannedFiles = BTreeMap<String, PathBuf>;

/// Why a bounded scan produced no listing
#[derive(Debug, Error)]
pub enum ScanInterrupted {
    #[error("scan did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("scan task failed: {0}")]
    Failed(String),
}

/// Lists candidate files below a directory.
#[derive(Debug, Clone)]
pub struct FileScanner {
    extension: String,
    recursive: bool,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self {
            extension: "pdf".to_string(),
            recursive: false,
        }
    }
}

/// Run a blocking `scan` on the blocking pool, giving up after `timeout` if
/// one is set. An abandoned scan keeps running on its thread; its listing is
/// dropped.
pub async fn bounded_scan<F>(
    scan: F,
    timeout: Option<Duration>,
) -> Result<ScannedFiles, ScanInterrupted>
where
    F: FnOnce() -> ScannedFiles + Send + 'static,
{
    let task = tokio::task::spawn_blocking(scan);

    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| ScanInterrupted::TimedOut(limit))?,
        None => task.await,
    };

    joined.map_err(|e| ScanInterrupted::Failed(e.to_string()))
}

impl FileScanner {
    /// A non-recursive scanner for `.pdf` files
    pub fn new() -> Self {
        Self::default()
    }

    /// Only keep files with this extension (case-insensitive, without the dot).
    /// An empty extension keeps every file.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Descend into subdirectories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Scan `directory`. A missing or unreadable directory yields an empty
    /// map and a warning.
    pub fn scan(&self, directory: &Path) -> ScannedFiles {
        let mut files = ScannedFiles::new();

        if !directory.is_dir() {
            tracing::warn!(directory = %directory.display(), "Directory does not exist");
            return files;
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error while scanning {}: {}", directory.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.accepts(entry.path()) {
                continue;
            }

            let Some(stem) = entry.path().file_stem() else {
                continue;
            };
            let base_name = stem.to_string_lossy().into_owned();

            if let Some(previous) = files.insert(base_name, entry.path().to_path_buf()) {
                tracing::debug!(
                    "Duplicate base name, {} replaces {}",
                    entry.path().display(),
                    previous.display()
                );
            }
        }

        tracing::debug!(
            directory = %directory.display(),
            recursive = self.recursive,
            count = files.len(),
            "Scan complete"
        );
        files
    }

    /// Scan on the blocking pool, giving up after `timeout` if one is set.
    pub async fn scan_with_timeout(
        &self,
        directory: &Path,
        timeout: Option<Duration>,
    ) -> Result<ScannedFiles, ScanInterrupted> {
        let scanner = self.clone();
        let directory = directory.to_path_buf();
        bounded_scan(move || scanner.scan(&directory), timeout).await
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extension.is_empty() {
            return true;
        }
        path.extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn test_scan_flat_directory() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("b-paper.pdf"));
        touch(&dir.path().join("a-paper.PDF"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/c-paper.pdf"));

        let files = FileScanner::new().scan(dir.path());
        let names: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a-paper", "b-paper"]);
        assert_eq!(files["b-paper"], dir.path().join("b-paper.pdf"));
    }

    #[test]
    fn test_scan_recursive() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("top.pdf"));
        touch(&dir.path().join("nested/deeper/inner.pdf"));
        touch(&dir.path().join("nested/readme.md"));

        let files = FileScanner::new().recursive(true).scan(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.contains_key("inner"));
        assert!(files.contains_key("top"));
    }

    #[test]
    fn test_scan_any_extension() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("one.pdf"));
        touch(&dir.path().join("two.epub"));

        let files = FileScanner::new().extension("").scan(dir.path());
        assert_eq!(files.len(), 2);

        let files = FileScanner::new().extension(".epub").scan(dir.path());
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["two"]);
    }

    #[test]
    fn test_duplicate_base_name_last_wins() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a/same.pdf"));
        touch(&dir.path().join("b/same.pdf"));

        let files = FileScanner::new().recursive(true).scan(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(files["same"], dir.path().join("b/same.pdf"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let files = FileScanner::new().scan(Path::new("/nonexistent/pdfs"));
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_scan_with_timeout_completes() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("paper.pdf"));

        let files = FileScanner::new()
            .scan_with_timeout(dir.path(), Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);

        let files = FileScanner::new()
            .scan_with_timeout(dir.path(), None)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_scan_times_out() {
        let result = bounded_scan(
            || {
                std::thread::sleep(Duration::from_millis(300));
                ScannedFiles::new()
            },
            Some(Duration::from_millis(20)),
        )
        .await;

        match result {
            Err(ScanInterrupted::TimedOut(limit)) => {
                assert_eq!(limit, Duration::from_millis(20))
            }
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bounded_scan_reports_panicked_scan() {
        let result = bounded_scan(|| panic!("unreadable volume"), None).await;
        assert!(matches!(result, Err(ScanInterrupted::Failed(_))));
    }
}
