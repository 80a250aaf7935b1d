//! Text normalization applied before similarity scoring.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Turn control characters into spaces, lowercase and collapse whitespace.
pub fn normalize_heading_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    cleaned
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased word tokens after compatibility decomposition with combining
/// marks removed, so `"Café"` and `"cafe"` produce the same tokens. Letters
/// of every script are kept.
pub fn fold_tokens(text: &str) -> Vec<String> {
    static RE_WORD: OnceLock<Regex> = OnceLock::new();
    let re = RE_WORD.get_or_init(|| Regex::new(r"\w+").unwrap());

    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    re.find_iter(&folded).map(|m| m.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_heading_text() {
        assert_eq!(normalize_heading_text("  ACUTE\tOtitis\n Media "), "acute otitis media");
        assert_eq!(normalize_heading_text("a\u{0007}b"), "a b");
        assert_eq!(normalize_heading_text(""), "");
    }

    #[test]
    fn test_fold_tokens_strips_diacritics_and_punctuation() {
        assert_eq!(fold_tokens("Café, Crème-Brûlée!"), vec!["cafe", "creme", "brulee"]);
        assert_eq!(fold_tokens("MYOCARDITIS"), fold_tokens("myocarditis"));
        assert!(fold_tokens("  -- ").is_empty());
    }

    #[test]
    fn test_fold_tokens_keeps_non_latin_scripts() {
        assert_eq!(fold_tokens("МИОКАРДИТ"), vec!["миокардит"]);
        assert_eq!(fold_tokens("Μυοκαρδίτιδα"), fold_tokens("ΜΥΟΚΑΡΔΙΤΙΔΑ"));
        assert_eq!(fold_tokens("心肌炎 概述"), vec!["心肌炎", "概述"]);
    }
}
