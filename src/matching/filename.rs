//! Filename classification.
//!
//! A PDF base name follows one of two conventions: it is either a DOI (or a
//! publisher-specific DOI suffix such as `isj.12345`), or a title optionally
//! followed by `_<year>_<journal>`. [`FilenameAnalyzer::analyze`] detects the
//! convention and derives the two lookup keys used by the matching engine.
//!
//! # DOI prefixes
//!
//! DOI detection is driven by an ordered table of [`DoiPrefix`] entries; the
//! first prefix the name starts with wins. Publisher-specific short prefixes
//! carry the registrant code needed to rebuild the full DOI:
//!
//! | Prefix        | Rebuilt DOI              |
//! |---------------|--------------------------|
//! | `isj.`        | `10.1111/<name>`         |
//! | `j.1365-2575` | `10.1111/<name>`         |
//! | `10.`         | `<name>` (already a DOI) |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::TextNormalizer;

static YEAR_INFIX: OnceLock<Regex> = OnceLock::new();
static YEAR_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn year_infix_re() -> &'static Regex {
    YEAR_INFIX.get_or_init(|| Regex::new(r"_(\d{4})_").expect("valid year pattern"))
}

fn year_suffix_re() -> &'static Regex {
    YEAR_SUFFIX.get_or_init(|| Regex::new(r"_(\d{4})$").expect("valid year pattern"))
}

/// A known DOI-style filename prefix and how to rebuild the full DOI from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoiPrefix {
    /// Prefix the (cleaned) base name starts with, compared case-insensitively
    pub prefix: String,

    /// Registrant code to prepend as `<registrant>/<name>`; `None` when the
    /// name already is a full DOI
    #[serde(default)]
    pub registrant: Option<String>,
}

impl DoiPrefix {
    /// A short publisher prefix expanded with a registrant code
    pub fn expanded(prefix: impl Into<String>, registrant: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            registrant: Some(registrant.into()),
        }
    }

    /// A prefix whose names are used as-is
    pub fn verbatim(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            registrant: None,
        }
    }

    fn matches(&self, name_lower: &str) -> bool {
        !self.prefix.is_empty() && name_lower.starts_with(&self.prefix.to_lowercase())
    }

    fn full_doi(&self, name: &str) -> String {
        match &self.registrant {
            Some(registrant) => format!("{}/{}", registrant, name),
            None => name.to_string(),
        }
    }
}

/// The built-in prefix table, in detection order.
pub fn default_doi_prefixes() -> Vec<DoiPrefix> {
    vec![
        // Information Systems Journal
        DoiPrefix::expanded("isj.", "10.1111"),
        // Information Systems Journal, pre-2012 numbering
        DoiPrefix::expanded("j.1365-2575", "10.1111"),
        DoiPrefix::verbatim("10."),
    ]
}

/// Lookup keys derived from one base name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilenameKeys {
    /// Letters-only key used for title prefix matching
    pub title_key: String,

    /// Letters-and-digits key used for DOI matching
    pub doi_key: String,

    /// Whether the name was recognized as a DOI
    pub is_doi_format: bool,
}

/// Classifies base names and derives their lookup keys.
#[derive(Debug, Clone)]
pub struct FilenameAnalyzer {
    prefixes: Vec<DoiPrefix>,
}

impl Default for FilenameAnalyzer {
    fn default() -> Self {
        Self::new(default_doi_prefixes())
    }
}

impl FilenameAnalyzer {
    /// Create an analyzer with an explicit prefix table
    pub fn new(prefixes: Vec<DoiPrefix>) -> Self {
        Self { prefixes }
    }

    /// Built-in table with `extra` prefixes tried first
    pub fn with_extra_prefixes(extra: impl IntoIterator<Item = DoiPrefix>) -> Self {
        let mut prefixes: Vec<DoiPrefix> = extra.into_iter().collect();
        prefixes.extend(default_doi_prefixes());
        Self::new(prefixes)
    }

    pub fn prefixes(&self) -> &[DoiPrefix] {
        &self.prefixes
    }

    /// Analyze a base name (file name without extension).
    pub fn analyze(&self, base_name: &str) -> FilenameKeys {
        let cleaned = TextNormalizer::remove_special_encoding(base_name);

        match self.doi_prefix(&cleaned) {
            Some(prefix) => FilenameKeys {
                title_key: TextNormalizer::normalize(&cleaned, true),
                doi_key: TextNormalizer::normalize(&prefix.full_doi(&cleaned), false),
                is_doi_format: true,
            },
            None => FilenameKeys {
                title_key: TextNormalizer::normalize(extract_title_part(&cleaned), true),
                doi_key: TextNormalizer::normalize(&cleaned, false),
                is_doi_format: false,
            },
        }
    }

    /// The first prefix the name starts with, if any
    pub fn doi_prefix(&self, name: &str) -> Option<&DoiPrefix> {
        let lower = name.to_lowercase();
        self.prefixes.iter().find(|p| p.matches(&lower))
    }

    pub fn is_doi_format(&self, name: &str) -> bool {
        self.doi_prefix(name).is_some()
    }
}

/// Everything before an `_YYYY_` infix or an `_YYYY` suffix; the whole name otherwise.
pub fn extract_title_part(name: &str) -> &str {
    if let Some(m) = year_infix_re().find(name) {
        return &name[..m.start()];
    }
    if let Some(m) = year_suffix_re().find(name) {
        return &name[..m.start()];
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(name: &str) -> FilenameKeys {
        FilenameAnalyzer::default().analyze(name)
    }

    #[test]
    fn test_isj_prefix_is_expanded() {
        let keys = analyze("isj.12345");
        assert!(keys.is_doi_format);
        assert_eq!(keys.doi_key, "101111isj12345");
        assert_eq!(keys.title_key, "isj");
    }

    #[test]
    fn test_legacy_isj_prefix_is_expanded() {
        let keys = analyze("j.1365-2575.2009.00328.x");
        assert!(keys.is_doi_format);
        assert_eq!(keys.doi_key, "101111j13652575200900328x");
    }

    #[test]
    fn test_generic_doi_used_as_is() {
        let keys = analyze("10.1016/j.dss.2024.001");
        assert!(keys.is_doi_format);
        assert_eq!(keys.doi_key, "101016jdss2024001");
    }

    #[test]
    fn test_prefix_detection_is_case_insensitive() {
        let keys = analyze("ISJ.12345");
        assert!(keys.is_doi_format);
        assert_eq!(keys.doi_key, "101111isj12345");
    }

    #[test]
    fn test_year_infix_is_cut() {
        let keys = analyze("A-computer-vision-based_2024_DSS");
        assert!(!keys.is_doi_format);
        assert_eq!(keys.title_key, "acomputervisionbased");
        assert_eq!(keys.doi_key, "acomputervisionbased2024dss");
        assert_eq!(
            analyze("A-title_2024_Journal").title_key,
            analyze("A-title").title_key
        );
    }

    #[test]
    fn test_year_suffix_is_cut() {
        assert_eq!(analyze("Some-Article-Title_1999").title_key, "somearticletitle");
    }

    #[test]
    fn test_plain_title() {
        let keys = analyze("Some-Article-Title");
        assert!(!keys.is_doi_format);
        assert_eq!(keys.title_key, "somearticletitle");
    }

    #[test]
    fn test_non_year_digit_runs_are_kept_in_title_part() {
        assert_eq!(extract_title_part("Deep_12345_Learning"), "Deep_12345_Learning");
        assert_eq!(extract_title_part("Deep-2024-Learning"), "Deep-2024-Learning");
        assert_eq!(extract_title_part("Web3_2023_MISQ_2024"), "Web3");
    }

    #[test]
    fn test_special_encoding_removed_first() {
        assert_eq!(analyze("Title#x3f;With_2024_DSS").title_key, "titlewith");
        // the escape would otherwise hide the DOI prefix
        assert!(analyze("#x20;10.1002/abc").is_doi_format);
    }

    #[test]
    fn test_empty_name() {
        let keys = analyze("");
        assert!(!keys.is_doi_format);
        assert!(keys.title_key.is_empty());
        assert!(keys.doi_key.is_empty());
    }

    #[test]
    fn test_extra_prefixes_take_precedence() {
        let analyzer = FilenameAnalyzer::with_extra_prefixes([DoiPrefix::expanded("misq.", "10.25300")]);
        let keys = analyzer.analyze("misq.2021.15434");
        assert!(keys.is_doi_format);
        assert_eq!(keys.doi_key, "1025300misq202115434");
        assert_eq!(analyzer.prefixes().len(), 4);
    }
}
