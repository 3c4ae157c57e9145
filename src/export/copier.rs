use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use serde::Serialize;

use crate::models::BatchResult;

/// A file that could not be copied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Outcome of a copy run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyStats {
    /// Matched records considered
    pub total: usize,
    pub copied: usize,
    /// Targets that already existed
    pub skipped: usize,
    pub failed: usize,
    pub copied_files: Vec<PathBuf>,
    pub failures: Vec<CopyFailure>,
}

impl CopyStats {
    fn fail(&mut self, source: &Path, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(CopyFailure {
            source: source.to_path_buf(),
            reason: reason.into(),
        });
    }
}

/// Copies the single-match PDFs of a batch into one directory, optionally
/// renamed to `<uuid>.pdf`.
#[derive(Debug)]
pub struct PdfCopier {
    target_dir: PathBuf,
    progress: Option<ProgressBar>,
}

impl PdfCopier {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            progress: None,
        }
    }

    /// Report each processed file on `bar`; its length is set per batch
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Copy every `Matched` file of `batch`.
    ///
    /// When `uuid_field` is given and the record has a value for it, the copy
    /// is named `<uuid>.pdf`; otherwise the original file name is kept.
    /// Existing targets are skipped unless `overwrite` is set. Individual
    /// failures are counted and never abort the run; only failing to create
    /// the target directory is an error.
    pub fn copy_matched(
        &self,
        batch: &BatchResult,
        uuid_field: Option<&str>,
        overwrite: bool,
    ) -> std::io::Result<CopyStats> {
        fs::create_dir_all(&self.target_dir)?;

        let mut stats = CopyStats {
            total: batch.matched_count(),
            ..CopyStats::default()
        };
        tracing::info!(
            "Copying {} matched PDFs to {}",
            stats.total,
            self.target_dir.display()
        );

        if let Some(bar) = &self.progress {
            bar.set_length(stats.total as u64);
            bar.set_position(0);
        }

        for result in batch.matched() {
            if let Some(bar) = &self.progress {
                bar.inc(1);
            }

            let Some(source) = result.outcome.file() else {
                continue;
            };
            if !source.is_file() {
                stats.fail(source, "source file does not exist");
                continue;
            }

            let original_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let target_name = match uuid_field {
                Some(field) => match result.record.get(field) {
                    Some(uuid) => format!("{}.pdf", uuid),
                    None => {
                        tracing::warn!(
                            "Record {} has no {}, keeping file name {}",
                            result.record_index,
                            field,
                            original_name
                        );
                        original_name
                    }
                },
                None => original_name,
            };

            let target = self.target_dir.join(&target_name);
            if target.exists() && !overwrite {
                tracing::debug!("Skipping existing {}", target_name);
                stats.skipped += 1;
                continue;
            }

            match fs::copy(source, &target) {
                Ok(_) => {
                    tracing::debug!("Copied {} -> {}", source.display(), target_name);
                    stats.copied += 1;
                    stats.copied_files.push(target);
                }
                Err(e) => {
                    tracing::error!("Failed to copy {}: {}", source.display(), e);
                    stats.fail(source, e.to_string());
                }
            }
        }

        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        tracing::info!(
            copied = stats.copied,
            skipped = stats.skipped,
            failed = stats.failed,
            "PDF copy finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchMethod, MatchOutcome, MatchResult, Record, REASON_NO_MATCH};
    use tempfile::tempdir;

    fn matched(index: usize, uuid: &str, file: &Path) -> MatchResult {
        let record: Record = [("label", "x"), ("uuid", uuid)].into_iter().collect();
        MatchResult::new(
            index,
            record,
            MatchOutcome::from_files(vec![file.to_path_buf()], MatchMethod::Title),
        )
    }

    #[test]
    fn test_copy_with_uuid_rename() {
        let dir = tempdir().unwrap();
        let pdfs = dir.path().join("pdfs");
        fs::create_dir_all(&pdfs).unwrap();
        fs::write(pdfs.join("first.pdf"), b"1").unwrap();
        fs::write(pdfs.join("second.pdf"), b"2").unwrap();

        let mut batch = BatchResult::new("papers", 4, 2);
        batch.results.push(matched(0, "u-1", &pdfs.join("first.pdf")));
        batch.results.push(matched(1, "", &pdfs.join("second.pdf")));
        batch.results.push(matched(2, "u-3", &pdfs.join("gone.pdf")));
        batch.results.push(MatchResult::new(
            3,
            Record::default(),
            MatchOutcome::unmatched(REASON_NO_MATCH),
        ));

        let target = dir.path().join("out");
        let stats = PdfCopier::new(&target)
            .copy_matched(&batch, Some("uuid"), false)
            .unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.copied, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.failures[0].source, pdfs.join("gone.pdf"));
        assert_eq!(fs::read(target.join("u-1.pdf")).unwrap(), b"1");
        assert_eq!(fs::read(target.join("second.pdf")).unwrap(), b"2");
    }

    #[test]
    fn test_existing_target_skipped_unless_overwrite() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("paper.pdf");
        fs::write(&source, b"new").unwrap();
        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("paper.pdf"), b"old").unwrap();

        let mut batch = BatchResult::new("papers", 1, 1);
        batch.results.push(matched(0, "", &source));

        let copier = PdfCopier::new(&target);
        let stats = copier.copy_matched(&batch, None, false).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(fs::read(target.join("paper.pdf")).unwrap(), b"old");

        let stats = copier.copy_matched(&batch, None, true).unwrap();
        assert_eq!(stats.copied, 1);
        assert_eq!(fs::read(target.join("paper.pdf")).unwrap(), b"new");
    }

    #[test]
    fn test_progress_bar_tracks_batch() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("paper.pdf");
        fs::write(&source, b"x").unwrap();

        let mut batch = BatchResult::new("papers", 1, 1);
        batch.results.push(matched(0, "", &source));

        let bar = ProgressBar::hidden();
        PdfCopier::new(dir.path().join("out"))
            .with_progress(bar.clone())
            .copy_matched(&batch, None, false)
            .unwrap();
        assert_eq!(bar.position(), 1);
        assert!(bar.is_finished());
    }
}
