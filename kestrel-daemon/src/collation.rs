//! Label collation at secondary strength.
//!
//! Labels are compared first on their base letters (accents and case
//! removed), then on accents, then on case, then on the raw text. So "cafe"
//! and "café" are neighbours, "apple" comes before "Zebra", and distinct
//! letters never collide.

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Precomputed sort keys for one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollationKey {
    base: String,
    accented: String,
    case_bits: Vec<bool>,
    raw: String,
}

impl CollationKey {
    pub fn new(label: &str) -> Self {
        let decomposed: String = label.nfd().collect();
        let accented: String = decomposed.chars().flat_map(char::to_lowercase).collect();
        let base: String = accented.chars().filter(|c| !is_combining_mark(*c)).collect();
        let case_bits = decomposed
            .chars()
            .filter(|c| !is_combining_mark(*c))
            .map(char::is_uppercase)
            .collect();
        Self {
            base,
            accented,
            case_bits,
            raw: label.to_string(),
        }
    }
}

impl Ord for CollationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then_with(|| self.accented.cmp(&other.accented))
            // lowercase sorts before uppercase
            .then_with(|| self.case_bits.cmp(&other.case_bits))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for CollationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn compare(a: &str, b: &str) -> Ordering {
    CollationKey::new(a).cmp(&CollationKey::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(labels: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        v.sort_by(|a, b| compare(a, b));
        v
    }

    #[test]
    fn letter_order_beats_ascii_case_order() {
        assert_eq!(sorted(&["Zebra", "apple"]), vec!["apple", "Zebra"]);
    }

    #[test]
    fn accents_keep_words_adjacent() {
        assert_eq!(
            sorted(&["cafeteria", "café", "cab", "cafe"]),
            vec!["cab", "cafe", "café", "cafeteria"]
        );
    }

    #[test]
    fn distinct_letters_do_not_collide() {
        assert_eq!(compare("a", "b"), Ordering::Less);
        assert_ne!(compare("Ä", "A"), Ordering::Equal);
        assert_eq!(compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn case_only_differences_put_lowercase_first() {
        assert_eq!(sorted(&["Mail", "mail"]), vec!["mail", "Mail"]);
    }
}
