//! Bibliographic records as read from a record source.

use serde::{Deserialize, Serialize};

/// Names of the record fields that hold the title, DOI and (optionally) a
/// unique identifier used to rename copied files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Title field
    pub title: String,

    /// DOI field
    pub doi: String,

    /// Unique identifier field (empty when the source has none)
    #[serde(default)]
    pub uuid: String,
}

impl FieldMapping {
    /// Create a mapping from explicit field names
    pub fn new(title: impl Into<String>, doi: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            doi: doi.into(),
            uuid: uuid.into(),
        }
    }

    /// Mapping used by tabular (CSV) exports: `Title` / `DOI`, no uuid.
    pub fn csv() -> Self {
        Self::new("Title", "DOI", "")
    }

    /// Mapping used by document store exports: `label` / `doi` / `uuid`.
    pub fn document() -> Self {
        Self::new("label", "doi", "uuid")
    }

    /// The uuid field, if one is configured
    pub fn uuid_field(&self) -> Option<&str> {
        let uuid = self.uuid.trim();
        (!uuid.is_empty()).then_some(uuid)
    }

    /// Apply per-field overrides, keeping the current name where none is given
    pub fn with_overrides(
        mut self,
        title: Option<String>,
        doi: Option<String>,
        uuid: Option<String>,
    ) -> Self {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(doi) = doi {
            self.doi = doi;
        }
        if let Some(uuid) = uuid {
            self.uuid = uuid;
        }
        self
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::csv()
    }
}

/// A single bibliographic record: field names to text values, in source
/// column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Field values in column order. Field names are unique.
    fields: Vec<(String, String)>,

    /// Where the record came from (file stem or collection name)
    pub source_id: Option<String>,
}

impl Record {
    /// Create a record from field data. A repeated field name keeps its first
    /// position and its last value.
    pub fn new<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::default();
        for (field, value) in fields {
            record.insert(field, value);
        }
        record
    }

    /// Attach a source identifier
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Set a field, appending it when new
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Trimmed value of a field, `None` when missing or blank
    pub fn get(&self, field: &str) -> Option<&str> {
        self.value(field).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Raw value of a field, empty when missing
    pub fn raw(&self, field: &str) -> &str {
        self.value(field).unwrap_or("")
    }

    /// Whether the record has the given field at all
    pub fn contains(&self, field: &str) -> bool {
        self.value(field).is_some()
    }

    /// Field names in column order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// `(field, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn value(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record::new(iter)
    }
}

/// Records fetched from one source, with their column order and field mapping.
#[derive(Debug, Clone)]
pub struct RecordSet {
    /// The records, in source order
    pub records: Vec<Record>,

    /// Column names in output order
    pub headers: Vec<String>,

    /// Name of the source (file stem or collection name)
    pub source_name: String,

    /// Which fields hold title, DOI and uuid
    pub field_mapping: FieldMapping,
}

impl RecordSet {
    /// Create a record set
    pub fn new(
        records: Vec<Record>,
        headers: Vec<String>,
        source_name: impl Into<String>,
        field_mapping: FieldMapping,
    ) -> Self {
        Self {
            records,
            headers,
            source_name: source_name.into(),
            field_mapping,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_mapping_presets() {
        let csv = FieldMapping::csv();
        assert_eq!(csv.title, "Title");
        assert_eq!(csv.doi, "DOI");
        assert_eq!(csv.uuid_field(), None);

        let doc = FieldMapping::document();
        assert_eq!(doc.title, "label");
        assert_eq!(doc.doi, "doi");
        assert_eq!(doc.uuid_field(), Some("uuid"));

        assert_eq!(FieldMapping::default(), csv);
    }

    #[test]
    fn test_field_mapping_overrides() {
        let mapping =
            FieldMapping::csv().with_overrides(None, Some("doi_str".to_string()), None);
        assert_eq!(mapping.title, "Title");
        assert_eq!(mapping.doi, "doi_str");
        assert_eq!(mapping.uuid, "");
    }

    #[test]
    fn test_record_get_trims_and_skips_blank() {
        let record: Record = [("Title", "  A title "), ("DOI", "   ")].into_iter().collect();
        assert_eq!(record.get("Title"), Some("A title"));
        assert_eq!(record.get("DOI"), None);
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.raw("DOI"), "   ");
        assert!(record.contains("DOI"));
    }

    #[test]
    fn test_record_keeps_column_order() {
        let record: Record = [
            ("Title", "A"),
            ("DOI", "10.1/x"),
            ("Year", "2024"),
            ("DOI", "10.1/y"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            record.field_names().collect::<Vec<_>>(),
            vec!["Title", "DOI", "Year"]
        );
        assert_eq!(record.raw("DOI"), "10.1/y");
        assert_eq!(record.len(), 3);
        assert_eq!(record.iter().last(), Some(("Year", "2024")));
    }

    #[test]
    fn test_record_source() {
        let record = Record::default().with_source("scopus");
        assert_eq!(record.source_id.as_deref(), Some("scopus"));
    }
}
