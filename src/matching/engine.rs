//! Record-to-file matching.
//!
//! Matching runs in two phases per record. The DOI phase compares the
//! record's normalized DOI against every indexed DOI key: an entry matches
//! when its key equals the record DOI or is contained in it. Only when that
//! finds nothing does the title phase run, matching every indexed title key
//! that the record's normalized title starts with. Filenames usually carry a
//! truncated title, hence the prefix rule rather than equality.
//!
//! Keys shorter than [`MIN_DOI_KEY_LEN`] / [`MIN_TITLE_KEY_LEN`] never take
//! part, so that short journal abbreviations cannot match unrelated records.
//!
//! Containment is one-directional: an indexed key inside a longer record DOI
//! matches, the reverse does not. A short indexed key can therefore match an
//! unrelated DOI that happens to contain it.

use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{bounded_scan, FileScanner, FilenameAnalyzer, ScannedFiles, TextNormalizer};
use crate::models::{
    BatchResult, FieldMapping, MatchMethod, MatchOutcome, MatchResult, Record, RecordSet,
    REASON_NO_FILES,
};

/// Shortest filename title key admitted to the title index.
pub const MIN_TITLE_KEY_LEN: usize = 10;

/// Shortest DOI key (record-side or indexed) considered in the DOI phase.
pub const MIN_DOI_KEY_LEN: usize = 5;

/// A file reachable from an index key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub base_name: String,
    pub path: PathBuf,
}

/// Key to files, iterated in first-insertion order.
#[derive(Debug, Default)]
pub struct KeyIndex {
    positions: HashMap<String, usize>,
    entries: Vec<(String, Vec<IndexedFile>)>,
}

impl KeyIndex {
    fn insert(&mut self, key: String, file: IndexedFile) {
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1.push(file),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, vec![file]));
            }
        }
    }

    /// Files stored under exactly `key`
    pub fn get(&self, key: &str) -> Option<&[IndexedFile]> {
        self.positions
            .get(key)
            .map(|&pos| self.entries[pos].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[IndexedFile])> {
        self.entries
            .iter()
            .map(|(key, files)| (key.as_str(), files.as_slice()))
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Title and DOI indexes built from one directory listing.
#[derive(Debug, Default)]
pub struct MatchIndex {
    title: KeyIndex,
    doi: KeyIndex,
}

impl MatchIndex {
    /// Analyze every scanned base name and index it.
    ///
    /// A name enters the title index only when its title key is at least
    /// [`MIN_TITLE_KEY_LEN`] long and it is not DOI-formatted; any name with a
    /// non-empty DOI key enters the DOI index.
    pub fn build(files: &ScannedFiles, analyzer: &FilenameAnalyzer) -> Self {
        let mut index = MatchIndex::default();

        for (base_name, path) in files {
            let keys = analyzer.analyze(base_name);
            tracing::debug!(
                file = %base_name,
                title_key = %keys.title_key,
                doi_key = %keys.doi_key,
                doi_format = keys.is_doi_format,
                "Analyzed file name"
            );

            let file = IndexedFile {
                base_name: base_name.clone(),
                path: path.clone(),
            };

            if !keys.is_doi_format && keys.title_key.len() >= MIN_TITLE_KEY_LEN {
                index.title.insert(keys.title_key, file.clone());
            }
            if !keys.doi_key.is_empty() {
                index.doi.insert(keys.doi_key, file);
            }
        }

        index
    }

    pub fn title_index(&self) -> &KeyIndex {
        &self.title
    }

    pub fn doi_index(&self) -> &KeyIndex {
        &self.doi
    }

    /// Files whose DOI key equals or is contained in `normalized_doi`
    pub fn find_by_doi(&self, normalized_doi: &str) -> Vec<&Path> {
        if normalized_doi.len() < MIN_DOI_KEY_LEN {
            return Vec::new();
        }
        self.doi
            .iter()
            .filter(|(key, _)| key.len() >= MIN_DOI_KEY_LEN && normalized_doi.contains(key))
            .flat_map(|(_, files)| files.iter().map(|f| f.path.as_path()))
            .collect()
    }

    /// Files whose title key is a prefix of `normalized_title`
    pub fn find_by_title(&self, normalized_title: &str) -> Vec<&Path> {
        self.title
            .iter()
            .filter(|(key, _)| !key.is_empty() && normalized_title.starts_with(key))
            .flat_map(|(_, files)| files.iter().map(|f| f.path.as_path()))
            .collect()
    }

    /// Run both phases for a raw title/DOI pair and classify the result.
    pub fn lookup(&self, title: Option<&str>, doi: Option<&str>) -> MatchOutcome {
        let mut method = MatchMethod::Doi;
        let mut found = doi
            .map(|doi| self.find_by_doi(&TextNormalizer::normalize(doi, false)))
            .unwrap_or_default();

        if found.is_empty() {
            if let Some(title) = title {
                method = MatchMethod::Title;
                found = self.find_by_title(&TextNormalizer::normalize(title, true));
            }
        }

        MatchOutcome::from_files(dedup_paths(found), method)
    }
}

/// Drop repeated paths, keeping first-seen order.
fn dedup_paths(paths: Vec<&Path>) -> Vec<PathBuf> {
    let mut seen = HashSet::with_capacity(paths.len());
    paths
        .into_iter()
        .filter(|p| seen.insert(*p))
        .map(Path::to_path_buf)
        .collect()
}

/// Matches record sets against a directory of files.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    analyzer: FilenameAnalyzer,
    scanner: FileScanner,
    parallel: bool,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self {
            analyzer: FilenameAnalyzer::default(),
            scanner: FileScanner::new(),
            parallel: true,
        }
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom filename analyzer (e.g. with extra DOI prefixes)
    pub fn with_analyzer(mut self, analyzer: FilenameAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Use a custom scanner (e.g. another file extension)
    pub fn with_scanner(mut self, scanner: FileScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Evaluate records on the rayon pool. Output order is unaffected.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn analyzer(&self) -> &FilenameAnalyzer {
        &self.analyzer
    }

    /// Scan `directory` and match every record against it.
    pub fn match_all(&self, directory: &Path, records: &RecordSet, recursive: bool) -> BatchResult {
        tracing::info!(
            directory = %directory.display(),
            source = %records.source_name,
            title_field = %records.field_mapping.title,
            doi_field = %records.field_mapping.doi,
            "Starting match"
        );

        let files = self.scanner.clone().recursive(recursive).scan(directory);
        self.match_files(&files, records)
    }

    /// Like [`match_all`](Self::match_all), but the scan runs on the blocking
    /// pool and is abandoned after `timeout`. A timed-out scan is handled like
    /// a missing directory: every record is unmatched.
    pub async fn match_all_with_timeout(
        &self,
        directory: &Path,
        records: &RecordSet,
        recursive: bool,
        timeout: Option<Duration>,
    ) -> BatchResult {
        let scanner = self.scanner.clone().recursive(recursive);
        let root = directory.to_path_buf();
        self.match_scan_with_timeout(
            directory,
            move || scanner.scan(&root),
            records,
            timeout,
        )
        .await
    }

    /// Match records against the listing produced by a blocking `scan` of
    /// `directory`, abandoning the scan after `timeout`.
    pub async fn match_scan_with_timeout<F>(
        &self,
        directory: &Path,
        scan: F,
        records: &RecordSet,
        timeout: Option<Duration>,
    ) -> BatchResult
    where
        F: FnOnce() -> ScannedFiles + Send + 'static,
    {
        match bounded_scan(scan, timeout).await {
            Ok(files) => self.match_files(&files, records),
            Err(e) => {
                tracing::warn!(directory = %directory.display(), "File scan aborted: {}", e);
                all_unmatched(records, 0, REASON_NO_FILES)
            }
        }
    }

    /// Match records against an existing directory listing.
    pub fn match_files(&self, files: &ScannedFiles, records: &RecordSet) -> BatchResult {
        tracing::info!(
            files = files.len(),
            records = records.len(),
            "Matching {} records against {} files",
            records.len(),
            files.len()
        );

        if files.is_empty() {
            tracing::warn!("No files found");
            return all_unmatched(records, 0, REASON_NO_FILES);
        }

        let index = MatchIndex::build(files, &self.analyzer);
        tracing::debug!(
            title_keys = index.title_index().len(),
            doi_keys = index.doi_index().len(),
            "Index built"
        );

        let fields = &records.field_mapping;
        let outcomes: Vec<MatchOutcome> = if self.parallel {
            records
                .records
                .par_iter()
                .enumerate()
                .map(|(idx, record)| match_record(&index, idx, record, fields))
                .collect()
        } else {
            records
                .records
                .iter()
                .enumerate()
                .map(|(idx, record)| match_record(&index, idx, record, fields))
                .collect()
        };

        let mut batch = BatchResult::new(&records.source_name, records.len(), files.len());
        batch.results = records
            .records
            .iter()
            .cloned()
            .zip(outcomes)
            .enumerate()
            .map(|(idx, (record, outcome))| MatchResult::new(idx, record, outcome))
            .collect();

        log_statistics(&batch);
        batch
    }
}

/// Classify one record against the prebuilt index.
pub fn match_record(
    index: &MatchIndex,
    idx: usize,
    record: &Record,
    fields: &FieldMapping,
) -> MatchOutcome {
    let outcome = index.lookup(record.get(&fields.title), record.get(&fields.doi));

    match &outcome {
        MatchOutcome::Matched { file, method } => tracing::info!(
            "Record {}: matched ({}) -> '{}'",
            idx + 1,
            method,
            file.file_name().unwrap_or_default().to_string_lossy()
        ),
        MatchOutcome::MultiMatched { files, method } => tracing::warn!(
            "Record {}: {} files matched ({}): {:?}",
            idx + 1,
            files.len(),
            method,
            files
                .iter()
                .map(|f| f.file_name().unwrap_or_default().to_string_lossy())
                .collect::<Vec<_>>()
        ),
        MatchOutcome::Unmatched { .. } => {
            tracing::debug!("Record {}: no matching file", idx + 1)
        }
    }

    outcome
}

fn all_unmatched(records: &RecordSet, total_files: usize, reason: &str) -> BatchResult {
    let mut batch = BatchResult::new(&records.source_name, records.len(), total_files);
    batch.results = records
        .records
        .iter()
        .enumerate()
        .map(|(idx, record)| MatchResult::new(idx, record.clone(), MatchOutcome::unmatched(reason)))
        .collect();
    batch
}

fn log_statistics(batch: &BatchResult) {
    tracing::info!(
        source = %batch.source_name,
        records = batch.total_records,
        files = batch.total_files,
        matched = batch.matched_count(),
        unmatched = batch.unmatched_count(),
        multi_matched = batch.multi_matched_count(),
        "Match rate {:.1}%",
        batch.match_rate() * 100.0
    );
}
