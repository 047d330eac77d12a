//! Transcript normalization and label extraction.
//!
//! Speech transcripts arrive as free text ("Please show me HELLO!"). Before
//! lookup they are normalized and scanned for catalog labels, so a transcript
//! containing a known label anywhere still resolves to it.

use crate::catalog::Catalog;

/// Lower-cases, trims and strips punctuation, collapsing runs of whitespace
/// to a single space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Returns the first catalog label (in insertion order) that occurs in the
/// normalized transcript as a whole word or phrase, preferring an exact
/// full-transcript match.
pub fn extract_label<'a>(catalog: &'a Catalog, text: &str) -> Option<&'a str> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    // The transcript may be exactly one label.
    if let Some(entry) = catalog.lookup(&normalized) {
        return Some(entry.name.as_str());
    }

    catalog
        .labels()
        .find(|label| contains_phrase(&normalized, label))
}

/// Whole-word phrase containment: `haystack` and `needle` are both
/// normalized, match must start and end on word boundaries.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let left_ok = begin == 0 || haystack.as_bytes()[begin - 1] == b' ';
        let right_ok = end == haystack.len() || haystack.as_bytes()[end] == b' ';
        if left_ok && right_ok {
            return true;
        }
        start = begin + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CatalogEntry;

    fn catalog() -> Catalog {
        Catalog::from_entries(vec![
            CatalogEntry::with_media("hello", "hello.mp4"),
            CatalogEntry::with_media("thank you", "thank_you.mp4"),
            CatalogEntry::with_media("hi", "hi.mp4"),
        ])
        .unwrap()
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Hello,   WORLD! "), "hello world");
        assert_eq!(normalize("thank-you"), "thank you");
        assert_eq!(normalize("..."), "");
    }

    #[test]
    fn extract_exact_transcript() {
        let cat = catalog();
        assert_eq!(extract_label(&cat, "Hello!"), Some("hello"));
        assert_eq!(extract_label(&cat, "THANK YOU"), Some("thank you"));
    }

    #[test]
    fn extract_label_inside_sentence() {
        let cat = catalog();
        assert_eq!(
            extract_label(&cat, "please say thank you now"),
            Some("thank you")
        );
        assert_eq!(extract_label(&cat, "well hello there"), Some("hello"));
    }

    #[test]
    fn extract_requires_word_boundaries() {
        let cat = catalog();
        // "hi" must not match inside "this".
        assert_eq!(extract_label(&cat, "this is nothing"), None);
    }

    #[test]
    fn extract_unknown_is_none() {
        let cat = catalog();
        assert_eq!(extract_label(&cat, "completely unrelated"), None);
        assert_eq!(extract_label(&cat, ""), None);
    }
}
