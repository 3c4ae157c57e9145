//! CSV record source.

use std::fs;
use std::path::{Path, PathBuf};

use super::{stem_of, RecordFilter, RecordSource, SourceError, SourceKind, SourceLocation};
use crate::models::{FieldMapping, Record, RecordSet};

/// Reads records from one CSV file or every matching CSV file in a directory.
///
/// The first row holds the column names. A leading UTF-8 byte order mark is
/// ignored, and short rows are padded with empty values.
#[derive(Debug, Clone)]
pub struct CsvSource {
    location: SourceLocation,
    field_mapping: FieldMapping,
    files: Vec<PathBuf>,
    connected: bool,
}

impl CsvSource {
    pub fn new(location: SourceLocation, field_mapping: FieldMapping) -> Self {
        Self {
            location,
            field_mapping,
            files: Vec::new(),
            connected: false,
        }
    }

    /// Files resolved by the last `connect`
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn read_file(&self, path: &Path, filter: &RecordFilter) -> Result<RecordSet, SourceError> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(format!("file does not exist: {}", path.display()))
            } else {
                SourceError::Io(e)
            }
        })?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let source_name = stem_of(path);

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in reader.records() {
            let row = row?;
            let record = Record::new(
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.as_str(), row.get(i).unwrap_or(""))),
            )
            .with_source(source_name.clone());

            if filter.matches(&record) {
                records.push(record);
            } else {
                skipped += 1;
            }
        }

        tracing::info!(
            file = %path.display(),
            records = records.len(),
            filtered_out = skipped,
            "Read CSV records"
        );

        Ok(RecordSet::new(
            records,
            headers,
            source_name,
            self.field_mapping.clone(),
        ))
    }
}

impl RecordSource for CsvSource {
    fn source_type(&self) -> &str {
        SourceKind::Csv.id()
    }

    fn field_mapping(&self) -> &FieldMapping {
        &self.field_mapping
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        self.files = self.location.resolve(SourceKind::Csv.default_pattern())?;
        self.connected = true;
        tracing::info!("CSV source ready, {} file(s)", self.files.len());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.files.clear();
    }

    fn available_sources(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|p| p.display().to_string())
            .collect()
    }

    fn fetch(
        &self,
        identifier: Option<&str>,
        filter: &RecordFilter,
    ) -> Result<RecordSet, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }

        let path = match identifier {
            Some(id) => self.location.locate(id),
            None => self
                .files
                .first()
                .cloned()
                .ok_or_else(|| SourceError::NotFound("no CSV files available".to_string()))?,
        };

        self.read_file(&path, filter)
    }
}
