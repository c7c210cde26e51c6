//! Word tokenizer shared by the index builder and the scorer.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_WORD: Regex = Regex::new(r"\w+").unwrap();
}

/// Split text into lowercase word tokens of at least 2 characters.
///
/// A token is a maximal run of word characters (Unicode letters, digits,
/// underscore). Order and duplicates are preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    RE_WORD
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Tokens in first-seen order with duplicates removed.
pub fn unique_tokens(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ,;!? ").is_empty());
    }

    #[test]
    fn test_lowercase_and_punctuation() {
        assert_eq!(
            tokenize("Create an EXCEL file, please!"),
            vec!["create", "an", "excel", "file", "please"]
        );
    }

    #[test]
    fn test_drops_single_characters() {
        assert_eq!(tokenize("a b cd e fg"), vec!["cd", "fg"]);
    }

    #[test]
    fn test_unicode_words_stay_whole() {
        assert_eq!(
            tokenize("Créer un fichier Excel"),
            vec!["créer", "un", "fichier", "excel"]
        );
    }

    #[test]
    fn test_every_token_is_word_class() {
        let re = Regex::new(r"^\w{2,}$").unwrap();
        for t in tokenize("snake_case x-y foo.bar 42 a1 ñandú!!") {
            assert!(re.is_match(&t), "bad token {t}");
            assert_eq!(t, t.to_lowercase());
        }
    }

    #[test]
    fn test_unique_tokens() {
        assert_eq!(unique_tokens("pdf to PDF to word"), vec!["pdf", "to", "word"]);
    }
}
