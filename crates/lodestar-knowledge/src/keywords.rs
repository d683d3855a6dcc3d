//! Request keyword extraction

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}_\-]*").unwrap());

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "each", "for", "from", "i",
    "in", "into", "is", "it", "its", "me", "my", "of", "on", "or", "please", "some", "that",
    "the", "then", "this", "to", "using", "we", "with", "you",
];

/// Lowercased, de-duplicated content words of a request
///
/// Tokens shorter than two characters and common stopwords are dropped.
#[must_use]
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().trim_matches(|c| c == '-' || c == '_'))
        .filter(|t| t.chars().count() >= 2 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Number of shared keywords
#[inline]
#[must_use]
pub fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn drops_stopwords_and_case() {
        assert_eq!(
            extract_keywords("Make a Grid of the BOXES, please"),
            set(&["boxes", "grid", "make"])
        );
    }

    #[test]
    fn deduplicates() {
        assert_eq!(extract_keywords("box box Box"), set(&["box"]));
    }

    #[test]
    fn keeps_hyphenated_terms() {
        assert_eq!(
            extract_keywords("a double-curved roof"),
            set(&["double-curved", "roof"])
        );
    }

    #[test]
    fn tokenizes_non_latin_scripts() {
        assert_eq!(
            extract_keywords("建立 立方體 陣列"),
            set(&["建立", "立方體", "陣列"])
        );
        assert_eq!(
            extract_keywords("Würfel und Fläche"),
            set(&["fläche", "und", "würfel"])
        );
    }

    #[test]
    fn single_characters_are_dropped() {
        assert_eq!(extract_keywords("x é 立 ab"), set(&["ab"]));
    }

    #[test]
    fn empty_text_has_no_keywords() {
        assert!(extract_keywords("  ...  ").is_empty());
    }

    #[test]
    fn overlap_counts_intersection() {
        assert_eq!(overlap(&set(&["a1", "b2", "c3"]), &set(&["b2", "c3", "d4"])), 2);
    }
}
