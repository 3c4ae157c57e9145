//! Merging per-source result files into run-wide summaries.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{
    create_csv_writer, generate_doi_url, ExportError, ALL_MATCHED_FILE, ALL_MULTI_MATCHED_FILE,
    ALL_UNMATCHED_FILE, MATCHED_DIR, MULTI_MATCHED_DIR, UNMATCHED_DIR,
};

pub const SOURCE_COLUMN: &str = "Source";
pub const DOI_LINK_COLUMN: &str = "DOI_Download_Link";
const DOI_COLUMN: &str = "DOI";

/// How [`CsvMerger::merge`] combines files
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Prepend a `Source` column holding the file stem up to its first `_`
    pub add_source_column: bool,

    /// Append a `DOI_Download_Link` column
    pub add_doi_link: bool,

    /// Keep only the first row per non-empty `dedup_key` value
    pub deduplicate: bool,

    /// Column used for deduplication and exclusion
    pub dedup_key: String,

    /// Rows whose key is in this set are dropped
    pub exclude_keys: HashSet<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            add_source_column: true,
            add_doi_link: false,
            deduplicate: false,
            dedup_key: DOI_COLUMN.to_string(),
            exclude_keys: HashSet::new(),
        }
    }
}

/// One parsed CSV file
struct Table {
    headers: Vec<String>,
    rows: Vec<HashMap<String, String>>,
}

impl Table {
    fn read(path: &Path) -> Result<Self, ExportError> {
        let content = fs::read_to_string(path)?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row?;
            rows.push(
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), row.get(i).unwrap_or("").to_string()))
                    .collect(),
            );
        }
        Ok(Self { headers, rows })
    }
}

/// Value of `column`, falling back to a case-insensitive header match
fn lookup<'a>(row: &'a HashMap<String, String>, column: &str) -> &'a str {
    if let Some(value) = row.get(column).filter(|v| !v.is_empty()) {
        return value;
    }
    row.iter()
        .find(|(k, v)| k.eq_ignore_ascii_case(column) && !v.is_empty())
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

/// `scopus_matched.csv` is tagged `scopus`
fn source_tag(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Concatenates CSV files.
#[derive(Debug, Clone)]
pub struct CsvMerger {
    bom: bool,
}

impl Default for CsvMerger {
    fn default() -> Self {
        Self { bom: true }
    }
}

impl CsvMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }

    /// Merge every `*.csv` in `input_dir` (sorted by name) into `output`.
    ///
    /// Column order comes from the first readable file. Files that cannot be
    /// read are skipped with a warning. Returns the number of merged rows;
    /// nothing is written when there are none.
    pub fn merge(
        &self,
        input_dir: &Path,
        output: &Path,
        options: &MergeOptions,
    ) -> Result<usize, ExportError> {
        let mut headers: Option<Vec<String>> = None;
        let mut merged: Vec<HashMap<String, String>> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for path in csv_files(input_dir)? {
            let table = match Table::read(&path) {
                Ok(table) => table,
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                    continue;
                }
            };
            let tag = source_tag(&path);

            for mut row in table.rows {
                let key = lookup(&row, &options.dedup_key).to_string();
                if !key.is_empty() {
                    if options.exclude_keys.contains(&key) {
                        continue;
                    }
                    if options.deduplicate && !seen.insert(key) {
                        continue;
                    }
                }

                if options.add_source_column {
                    row.insert(SOURCE_COLUMN.to_string(), tag.clone());
                }
                if options.add_doi_link {
                    let link = generate_doi_url(lookup(&row, DOI_COLUMN));
                    row.insert(DOI_LINK_COLUMN.to_string(), link);
                }
                merged.push(row);
            }

            if headers.is_none() {
                let mut columns = table.headers;
                if options.add_source_column {
                    columns.insert(0, SOURCE_COLUMN.to_string());
                }
                if options.add_doi_link {
                    columns.push(DOI_LINK_COLUMN.to_string());
                }
                headers = Some(columns);
            }
        }

        let Some(headers) = headers.filter(|_| !merged.is_empty()) else {
            tracing::warn!("No records to merge in {}", input_dir.display());
            return Ok(0);
        };

        let mut writer = create_csv_writer(output, self.bom)?;
        writer.write_record(&headers)?;
        for row in &merged {
            writer.write_record(headers.iter().map(|h| row.get(h).map(String::as_str).unwrap_or("")))?;
        }
        writer.flush()?;

        tracing::info!("Merged {} records into {}", merged.len(), output.display());
        Ok(merged.len())
    }

    /// Non-empty values of `column` in a CSV file; empty when the file is
    /// missing or unreadable.
    pub fn collect_keys(&self, path: &Path, column: &str) -> HashSet<String> {
        if !path.is_file() {
            return HashSet::new();
        }

        match Table::read(path) {
            Ok(table) => {
                let keys: HashSet<String> = table
                    .rows
                    .iter()
                    .map(|row| lookup(row, column))
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
                tracing::debug!("Collected {} keys from {}", keys.len(), path.display());
                keys
            }
            Err(e) => {
                tracing::warn!("Failed to collect keys from {}: {}", path.display(), e);
                HashSet::new()
            }
        }
    }
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Row counts of the summary files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub matched: usize,
    pub unmatched: usize,
    pub multi_matched: usize,
}

/// Builds the `ALL_*.csv` summaries from the per-source result files.
#[derive(Debug, Clone)]
pub struct SummaryGenerator {
    output_dir: PathBuf,
    merger: CsvMerger,
}

impl SummaryGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            merger: CsvMerger::new(),
        }
    }

    pub fn with_bom(mut self, bom: bool) -> Self {
        self.merger = self.merger.with_bom(bom);
        self
    }

    /// Write `ALL_MATCHED.csv`, `ALL_UNMATCHED.csv` and `ALL_MULTI_MATCHED.csv`.
    ///
    /// Unmatched records are deduplicated by DOI, and records whose DOI was
    /// matched by another source are left out of the unmatched summary.
    pub fn generate_all(&self) -> Result<SummaryCounts, ExportError> {
        let mut counts = SummaryCounts::default();

        let matched_dir = self.output_dir.join(MATCHED_DIR);
        let mut matched_dois = HashSet::new();
        if matched_dir.is_dir() {
            let path = self.output_dir.join(ALL_MATCHED_FILE);
            counts.matched = self
                .merger
                .merge(&matched_dir, &path, &MergeOptions::default())?;
            if counts.matched > 0 {
                matched_dois = self.merger.collect_keys(&path, DOI_COLUMN);
            }
        }

        let unmatched_dir = self.output_dir.join(UNMATCHED_DIR);
        if unmatched_dir.is_dir() {
            let options = MergeOptions {
                add_source_column: false,
                add_doi_link: true,
                deduplicate: true,
                exclude_keys: matched_dois,
                ..MergeOptions::default()
            };
            counts.unmatched = self.merger.merge(
                &unmatched_dir,
                &self.output_dir.join(ALL_UNMATCHED_FILE),
                &options,
            )?;
        }

        let multi_dir = self.output_dir.join(MULTI_MATCHED_DIR);
        if multi_dir.is_dir() {
            let options = MergeOptions {
                add_doi_link: true,
                ..MergeOptions::default()
            };
            counts.multi_matched = self.merger.merge(
                &multi_dir,
                &self.output_dir.join(ALL_MULTI_MATCHED_FILE),
                &options,
            )?;
        }

        tracing::info!(
            matched = counts.matched,
            unmatched = counts.unmatched,
            multi_matched = counts.multi_matched,
            "Summary files written"
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(path: &Path) -> Vec<Vec<String>> {
        let content = fs::read_to_string(path).unwrap();
        let content = content.trim_start_matches('\u{feff}');
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(content.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_source_tag() {
        assert_eq!(source_tag(Path::new("scopus_matched.csv")), "scopus");
        assert_eq!(source_tag(Path::new("wos.csv")), "wos");
    }

    #[test]
    fn test_merge_with_source_and_links() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        write(&input.join("b_unmatched.csv"), "Title,DOI\nB1,10.2/b\n");
        write(&input.join("a_unmatched.csv"), "\u{feff}Title,DOI\nA1,10.1/a\nA2,\n");
        write(&input.join("notes.txt"), "ignored");

        let out = dir.path().join("merged.csv");
        let options = MergeOptions {
            add_doi_link: true,
            ..MergeOptions::default()
        };
        let count = CsvMerger::new().merge(&input, &out, &options).unwrap();
        assert_eq!(count, 3);

        let rows = read(&out);
        assert_eq!(rows[0], vec!["Source", "Title", "DOI", "DOI_Download_Link"]);
        assert_eq!(rows[1], vec!["a", "A1", "10.1/a", "https://doi.org/10.1/a"]);
        assert_eq!(rows[2], vec!["a", "A2", "", ""]);
        assert_eq!(rows[3], vec!["b", "B1", "10.2/b", "https://doi.org/10.2/b"]);
    }

    #[test]
    fn test_merge_dedup_and_exclude() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        write(
            &input.join("a.csv"),
            "Title,doi\nOne,10.1/x\nOne again,10.1/x\nTwo,10.1/y\nNo doi,\nNo doi either,\n",
        );

        let out = dir.path().join("merged.csv");
        let options = MergeOptions {
            add_source_column: false,
            deduplicate: true,
            exclude_keys: HashSet::from(["10.1/y".to_string()]),
            ..MergeOptions::default()
        };
        let count = CsvMerger::new().merge(&input, &out, &options).unwrap();
        assert_eq!(count, 3);

        let titles: Vec<String> = read(&out).into_iter().skip(1).map(|r| r[0].clone()).collect();
        assert_eq!(titles, vec!["One", "No doi", "No doi either"]);
    }

    #[test]
    fn test_merge_nothing_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        write(&input.join("a.csv"), "Title,DOI\n");

        let out = dir.path().join("merged.csv");
        let count = CsvMerger::new()
            .merge(&input, &out, &MergeOptions::default())
            .unwrap();
        assert_eq!(count, 0);
        assert!(!out.exists());
    }

    #[test]
    fn test_collect_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.csv");
        write(&path, "Title,DOI\nA,10.1/a\nB,\nC,10.1/c\n");

        let keys = CsvMerger::new().collect_keys(&path, "DOI");
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("10.1/a"));

        assert!(CsvMerger::new()
            .collect_keys(&dir.path().join("missing.csv"), "DOI")
            .is_empty());
    }

    #[test]
    fn test_generate_all_excludes_matched_dois() {
        let dir = tempdir().unwrap();
        let out = dir.path();
        write(
            &out.join("matched/scopus_matched.csv"),
            "Title,DOI,Matched_PDF_Path\nFound,10.1/a,/p/a.pdf\n",
        );
        write(
            &out.join("unmatched/wos_unmatched.csv"),
            "Title,DOI,Unmatch_Reason\nFound elsewhere,10.1/a,no matching file\nMissing,10.1/b,no matching file\n",
        );
        write(
            &out.join("unmatched/ebsco_unmatched.csv"),
            "Title,DOI,Unmatch_Reason\nMissing dup,10.1/b,no matching file\n",
        );

        let counts = SummaryGenerator::new(out).generate_all().unwrap();
        assert_eq!(
            counts,
            SummaryCounts {
                matched: 1,
                unmatched: 1,
                multi_matched: 0
            }
        );

        let matched = read(&out.join(ALL_MATCHED_FILE));
        assert_eq!(matched[0][0], "Source");
        assert_eq!(matched[1][0], "scopus");

        // ebsco sorts first, so its copy of 10.1/b is the one kept
        let unmatched = read(&out.join(ALL_UNMATCHED_FILE));
        assert_eq!(unmatched.len(), 2);
        assert_eq!(unmatched[1][0], "Missing dup");
        assert_eq!(unmatched[1][3], "https://doi.org/10.1/b");

        assert!(!out.join(ALL_MULTI_MATCHED_FILE).exists());
    }
}
