use std::path::{Path, PathBuf};

use super::{
    create_csv_writer, ExportError, ResultExporter, MATCHED_DIR, MULTI_MATCHED_DIR, UNMATCHED_DIR,
};
use crate::models::{BatchResult, MatchResult};

/// Per-batch CSV exporter.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
    bom: bool,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            bom: true,
        }
    }

    /// Whether files start with a UTF-8 byte order mark (on by default, so
    /// spreadsheet tools detect the encoding)
    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write<'a>(
        &self,
        category: &str,
        source_name: &str,
        headers: &[String],
        extra_headers: &[&str],
        rows: impl Iterator<Item = &'a MatchResult>,
        extra_values: impl Fn(&MatchResult) -> Vec<String>,
    ) -> Result<Option<PathBuf>, ExportError> {
        let mut rows = rows.peekable();
        if rows.peek().is_none() {
            return Ok(None);
        }

        let path = self
            .output_dir
            .join(category)
            .join(format!("{}_{}.csv", source_name, category));
        let mut writer = create_csv_writer(&path, self.bom)?;

        let mut header_row: Vec<&str> = headers.iter().map(String::as_str).collect();
        header_row.extend_from_slice(extra_headers);
        writer.write_record(&header_row)?;

        let mut count = 0usize;
        for result in rows {
            let mut row: Vec<String> = headers
                .iter()
                .map(|h| result.record.raw(h).to_string())
                .collect();
            row.extend(extra_values(result));
            writer.write_record(&row)?;
            count += 1;
        }
        writer.flush()?;

        tracing::info!("Saved {} {} records to {}", count, category, path.display());
        Ok(Some(path))
    }
}

impl ResultExporter for CsvExporter {
    fn export_matched(
        &self,
        batch: &BatchResult,
        headers: &[String],
    ) -> Result<Option<PathBuf>, ExportError> {
        self.write(
            MATCHED_DIR,
            &batch.source_name,
            headers,
            &["Matched_PDF_Path"],
            batch.matched(),
            |r| {
                vec![r
                    .outcome
                    .file()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()]
            },
        )
    }

    fn export_unmatched(
        &self,
        batch: &BatchResult,
        headers: &[String],
    ) -> Result<Option<PathBuf>, ExportError> {
        self.write(
            UNMATCHED_DIR,
            &batch.source_name,
            headers,
            &["Unmatch_Reason"],
            batch.unmatched(),
            |r| vec![r.outcome.reason().map(|s| s.into_owned()).unwrap_or_default()],
        )
    }

    fn export_multi_matched(
        &self,
        batch: &BatchResult,
        headers: &[String],
    ) -> Result<Option<PathBuf>, ExportError> {
        self.write(
            MULTI_MATCHED_DIR,
            &batch.source_name,
            headers,
            &["Matched_PDF_Paths", "Match_Count"],
            batch.multi_matched(),
            |r| {
                let files = r.outcome.files();
                let joined = files
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                vec![joined, files.len().to_string()]
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchMethod, MatchOutcome, Record, REASON_NO_MATCH};
    use std::fs;
    use tempfile::tempdir;

    fn record(title: &str, doi: &str) -> Record {
        [("Title", title), ("DOI", doi), ("Year", "2024")]
            .into_iter()
            .collect()
    }

    fn sample_batch() -> BatchResult {
        let mut batch = BatchResult::new("scopus", 3, 4);
        batch.results.push(MatchResult::new(
            0,
            record("First", ""),
            MatchOutcome::from_files(vec![PathBuf::from("/pdfs/first.pdf")], MatchMethod::Title),
        ));
        batch.results.push(MatchResult::new(
            1,
            record("Second", "10.1/x"),
            MatchOutcome::unmatched(REASON_NO_MATCH),
        ));
        batch.results.push(MatchResult::new(
            2,
            record("Third, with comma", ""),
            MatchOutcome::from_files(
                vec![PathBuf::from("/pdfs/a.pdf"), PathBuf::from("/pdfs/b.pdf")],
                MatchMethod::Title,
            ),
        ));
        batch
    }

    fn headers() -> Vec<String> {
        vec!["Title".into(), "DOI".into(), "Year".into()]
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_export_all_categories() {
        let dir = tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path()).with_bom(false);
        let paths = exporter.export_all(&sample_batch(), &headers()).unwrap();

        let matched = paths.matched.clone().unwrap();
        assert_eq!(matched, dir.path().join("matched/scopus_matched.csv"));
        let rows = read_rows(&matched);
        assert_eq!(rows[0], vec!["Title", "DOI", "Year", "Matched_PDF_Path"]);
        assert_eq!(rows[1], vec!["First", "", "2024", "/pdfs/first.pdf"]);

        let rows = read_rows(&paths.unmatched.clone().unwrap());
        assert_eq!(rows[0].last().unwrap(), "Unmatch_Reason");
        assert_eq!(rows[1], vec!["Second", "10.1/x", "2024", REASON_NO_MATCH]);

        let rows = read_rows(&paths.multi_matched.clone().unwrap());
        assert_eq!(
            rows[0],
            vec!["Title", "DOI", "Year", "Matched_PDF_Paths", "Match_Count"]
        );
        assert_eq!(rows[1][0], "Third, with comma");
        assert_eq!(rows[1][3], "/pdfs/a.pdf; /pdfs/b.pdf");
        assert_eq!(rows[1][4], "2");

        assert_eq!(paths.written().count(), 3);
    }

    #[test]
    fn test_empty_category_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut batch = BatchResult::new("wos", 1, 0);
        batch.results.push(MatchResult::new(
            0,
            record("Lonely", ""),
            MatchOutcome::unmatched(REASON_NO_MATCH),
        ));

        let paths = CsvExporter::new(dir.path())
            .export_all(&batch, &headers())
            .unwrap();
        assert!(paths.matched.is_none());
        assert!(paths.multi_matched.is_none());
        assert!(!dir.path().join("matched").exists());

        let bytes = fs::read(paths.unmatched.unwrap()).unwrap();
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    }
}
