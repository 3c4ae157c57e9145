//! Text canonicalization shared by filename and record-side key building.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

static SPECIAL_ENCODING: OnceLock<Regex> = OnceLock::new();

fn special_encoding_re() -> &'static Regex {
    SPECIAL_ENCODING.get_or_init(|| Regex::new(r"#x[0-9a-fA-F]+;").expect("valid escape pattern"))
}

/// Pure string normalization helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    /// Lower-case `text` and keep only `[a-z]` (or `[a-z0-9]` when
    /// `remove_numbers` is false).
    pub fn normalize(text: &str, remove_numbers: bool) -> String {
        text.chars()
            .flat_map(char::to_lowercase)
            .filter(|c| c.is_ascii_lowercase() || (!remove_numbers && c.is_ascii_digit()))
            .collect()
    }

    /// Strip every `#x<hex>;` escape token, e.g. `file#x3f;name` becomes `filename`.
    pub fn remove_special_encoding(text: &str) -> Cow<'_, str> {
        let re = special_encoding_re();
        let mut cleaned = match re.replace_all(text, "") {
            Cow::Borrowed(untouched) => return Cow::Borrowed(untouched),
            Cow::Owned(cleaned) => cleaned,
        };
        // Removing a token can splice a new one together, e.g. `##x41;x41;;`.
        while re.is_match(&cleaned) {
            cleaned = re.replace_all(&cleaned, "").into_owned();
        }
        Cow::Owned(cleaned)
    }
}
