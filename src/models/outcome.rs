//! Per-record match outcomes and the batch container that aggregates them.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use super::Record;

/// Reason attached to every record when the scan found no files, including a
/// missing directory or a scan that did not finish in time.
pub const REASON_NO_FILES: &str = "no files in directory";

/// Reason attached to a record for which neither phase found a file.
pub const REASON_NO_MATCH: &str = "no matching file";

/// Which matching phase produced the evidence for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Doi,
    Title,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMethod::Doi => write!(f, "DOI"),
            MatchMethod::Title => write!(f, "Title"),
        }
    }
}

/// Classification of a record without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Unmatched,
    MultiMatched,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "matched"),
            MatchStatus::Unmatched => write!(f, "unmatched"),
            MatchStatus::MultiMatched => write!(f, "multi-matched"),
        }
    }
}

/// Outcome of matching one record.
///
/// The arity of the file list decides the variant: none is `Unmatched`,
/// one is `Matched`, two or more is `MultiMatched`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched {
        file: PathBuf,
        method: MatchMethod,
    },
    Unmatched {
        reason: String,
    },
    MultiMatched {
        files: Vec<PathBuf>,
        method: MatchMethod,
    },
}

impl MatchOutcome {
    /// Classify a deduplicated list of candidate files
    pub fn from_files(mut files: Vec<PathBuf>, method: MatchMethod) -> Self {
        match files.len() {
            0 => MatchOutcome::unmatched(REASON_NO_MATCH),
            1 => MatchOutcome::Matched {
                file: files.remove(0),
                method,
            },
            _ => MatchOutcome::MultiMatched { files, method },
        }
    }

    /// An unmatched outcome with the given reason
    pub fn unmatched(reason: impl Into<String>) -> Self {
        MatchOutcome::Unmatched {
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> MatchStatus {
        match self {
            MatchOutcome::Matched { .. } => MatchStatus::Matched,
            MatchOutcome::Unmatched { .. } => MatchStatus::Unmatched,
            MatchOutcome::MultiMatched { .. } => MatchStatus::MultiMatched,
        }
    }

    /// Matched file locations (empty for `Unmatched`)
    pub fn files(&self) -> &[PathBuf] {
        match self {
            MatchOutcome::Matched { file, .. } => std::slice::from_ref(file),
            MatchOutcome::Unmatched { .. } => &[],
            MatchOutcome::MultiMatched { files, .. } => files,
        }
    }

    /// The single matched file, only for `Matched`
    pub fn file(&self) -> Option<&Path> {
        match self {
            MatchOutcome::Matched { file, .. } => Some(file),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<MatchMethod> {
        match self {
            MatchOutcome::Matched { method, .. } | MatchOutcome::MultiMatched { method, .. } => {
                Some(*method)
            }
            MatchOutcome::Unmatched { .. } => None,
        }
    }

    /// Human-readable reason for `Unmatched` and `MultiMatched` outcomes
    pub fn reason(&self) -> Option<Cow<'_, str>> {
        match self {
            MatchOutcome::Matched { .. } => None,
            MatchOutcome::Unmatched { reason } => Some(Cow::Borrowed(reason)),
            MatchOutcome::MultiMatched { files, .. } => {
                Some(Cow::Owned(format!("matched {} files", files.len())))
            }
        }
    }
}

/// A record together with its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Position of the record in the input
    pub record_index: usize,

    /// The record that was matched
    pub record: Record,

    /// What the engine decided
    pub outcome: MatchOutcome,
}

impl MatchResult {
    pub fn new(record_index: usize, record: Record, outcome: MatchOutcome) -> Self {
        Self {
            record_index,
            record,
            outcome,
        }
    }

    pub fn status(&self) -> MatchStatus {
        self.outcome.status()
    }
}

/// Outcomes of one matching run, in input record order.
///
/// Counts and the match rate are derived from `results` on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Name of the record source
    pub source_name: String,

    /// Number of input records
    pub total_records: usize,

    /// Number of scanned files
    pub total_files: usize,

    /// One entry per input record
    pub results: Vec<MatchResult>,
}

impl BatchResult {
    pub fn new(source_name: impl Into<String>, total_records: usize, total_files: usize) -> Self {
        Self {
            source_name: source_name.into(),
            total_records,
            total_files,
            results: Vec::with_capacity(total_records),
        }
    }

    fn with_status(&self, status: MatchStatus) -> impl Iterator<Item = &MatchResult> {
        self.results.iter().filter(move |r| r.status() == status)
    }

    pub fn matched(&self) -> impl Iterator<Item = &MatchResult> {
        self.with_status(MatchStatus::Matched)
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &MatchResult> {
        self.with_status(MatchStatus::Unmatched)
    }

    pub fn multi_matched(&self) -> impl Iterator<Item = &MatchResult> {
        self.with_status(MatchStatus::MultiMatched)
    }

    pub fn matched_count(&self) -> usize {
        self.matched().count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched().count()
    }

    pub fn multi_matched_count(&self) -> usize {
        self.multi_matched().count()
    }

    /// Matched records over total records, 0.0 when there are no records
    pub fn match_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.matched_count() as f64 / self.total_records as f64
    }

    /// Snapshot of the summary statistics
    pub fn stats(&self) -> MatchStats {
        MatchStats {
            source_name: self.source_name.clone(),
            total_records: self.total_records,
            total_files: self.total_files,
            matched: self.matched_count(),
            unmatched: self.unmatched_count(),
            multi_matched: self.multi_matched_count(),
            match_rate: self.match_rate(),
        }
    }
}

/// Summary statistics of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub source_name: String,
    pub total_records: usize,
    pub total_files: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub multi_matched: usize,
    pub match_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, outcome: MatchOutcome) -> MatchResult {
        MatchResult::new(index, Record::default(), outcome)
    }

    #[test]
    fn test_outcome_from_files_arity() {
        let none = MatchOutcome::from_files(vec![], MatchMethod::Doi);
        assert_eq!(none.status(), MatchStatus::Unmatched);
        assert_eq!(none.reason().as_deref(), Some(REASON_NO_MATCH));
        assert!(none.files().is_empty());

        let one = MatchOutcome::from_files(vec![PathBuf::from("a.pdf")], MatchMethod::Title);
        assert_eq!(one.status(), MatchStatus::Matched);
        assert_eq!(one.file(), Some(Path::new("a.pdf")));
        assert_eq!(one.method(), Some(MatchMethod::Title));
        assert!(one.reason().is_none());

        let many = MatchOutcome::from_files(
            vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
            MatchMethod::Doi,
        );
        assert_eq!(many.status(), MatchStatus::MultiMatched);
        assert_eq!(many.files().len(), 2);
        assert!(many.file().is_none());
        assert!(many.reason().unwrap().contains('2'));
    }

    #[test]
    fn test_batch_counts_and_rate() {
        let mut batch = BatchResult::new("test", 4, 3);
        batch.results.push(result(
            0,
            MatchOutcome::from_files(vec!["a.pdf".into()], MatchMethod::Doi),
        ));
        batch.results.push(result(1, MatchOutcome::unmatched(REASON_NO_MATCH)));
        batch.results.push(result(
            2,
            MatchOutcome::from_files(vec!["b.pdf".into(), "c.pdf".into()], MatchMethod::Title),
        ));
        batch.results.push(result(
            3,
            MatchOutcome::from_files(vec!["c.pdf".into()], MatchMethod::Title),
        ));

        assert_eq!(batch.matched_count(), 2);
        assert_eq!(batch.unmatched_count(), 1);
        assert_eq!(batch.multi_matched_count(), 1);
        assert_eq!(
            batch.matched_count() + batch.unmatched_count() + batch.multi_matched_count(),
            batch.total_records
        );
        assert!((batch.match_rate() - 0.5).abs() < f64::EPSILON);

        let stats = batch.stats();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.matched, 2);
    }

    #[test]
    fn test_match_rate_zero_records() {
        let batch = BatchResult::new("empty", 0, 10);
        assert_eq!(batch.match_rate(), 0.0);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = MatchOutcome::unmatched("no matching file");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unmatched");
        assert_eq!(json["reason"], "no matching file");
    }
}
