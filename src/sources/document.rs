//! Document store exports as JSON.
//!
//! Accepts either a JSON array of objects or JSON Lines (one object per
//! line), which covers `mongoexport` output in both its modes. Values are
//! flattened to text: `{"$oid": ".."}` becomes the bare id, `null` becomes
//! empty, and nested arrays or objects keep their compact JSON form.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{stem_of, RecordFilter, RecordSource, SourceError, SourceKind, SourceLocation};
use crate::models::{FieldMapping, Record, RecordSet};

#[derive(Debug, Clone)]
pub struct JsonSource {
    location: SourceLocation,
    field_mapping: FieldMapping,
    files: Vec<PathBuf>,
    connected: bool,
}

impl JsonSource {
    pub fn new(location: SourceLocation, field_mapping: FieldMapping) -> Self {
        Self {
            location,
            field_mapping,
            files: Vec::new(),
            connected: false,
        }
    }

    fn read_file(&self, path: &Path, filter: &RecordFilter) -> Result<RecordSet, SourceError> {
        if !path.is_file() {
            return Err(SourceError::NotFound(format!(
                "file does not exist: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let documents = parse_documents(&content)?;
        let source_name = stem_of(path);

        let mut headers = BTreeSet::new();
        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            let record = Record::new(
                document
                    .into_iter()
                    .map(|(key, value)| (key, flatten_value(value))),
            )
            .with_source(source_name.clone());

            if filter.matches(&record) {
                headers.extend(record.field_names().map(str::to_string));
                records.push(record);
            }
        }

        tracing::info!(
            file = %path.display(),
            records = records.len(),
            "Read JSON documents"
        );

        Ok(RecordSet::new(
            records,
            headers.into_iter().collect(),
            source_name,
            self.field_mapping.clone(),
        ))
    }
}

impl RecordSource for JsonSource {
    fn source_type(&self) -> &str {
        SourceKind::Json.id()
    }

    fn field_mapping(&self) -> &FieldMapping {
        &self.field_mapping
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        self.files = self.location.resolve(SourceKind::Json.default_pattern())?;
        self.connected = true;
        tracing::info!("JSON source ready, {} file(s)", self.files.len());
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
                .ok_or_else(|| SourceError::NotFound("no JSON files available".to_string()))?,
        };

        self.read_file(&path, filter)
    }
}

fn parse_documents(content: &str) -> Result<Vec<Map<String, Value>>, SourceError> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| SourceError::Parse(format!("line {}: {}", n + 1, e)))
        })
        .collect()
}

fn flatten_value(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Object(mut map) if map.len() == 1 && map.contains_key("$oid") => {
            match map.remove("$oid") {
                Some(Value::String(id)) => id,
                Some(other) => other.to_string(),
                None => String::new(),
            }
        }
        other => other.to_string(),
    }
}
