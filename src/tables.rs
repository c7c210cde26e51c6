//! Static lookup tables used while scoring prompts.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    /// Verbs signalling investigative or creative intent (English and French),
    /// mapped to the multiplier applied on top of their word-match score.
    pub static ref ANALYTICAL_VERBS: HashMap<&'static str, f64> = [
        // English tier 1
        ("extract", 1.5), ("analyze", 1.5), ("parse", 1.5), ("examine", 1.5), ("read", 1.5),
        // French tier 1
        ("extraire", 1.5), ("analyser", 1.5), ("parser", 1.5), ("examiner", 1.5),
        ("lire", 1.5), ("lis", 1.5),
        // English tier 2
        ("process", 1.4), ("review", 1.4), ("check", 1.3), ("scan", 1.3),
        // French tier 2
        ("traiter", 1.4), ("vérifier", 1.3), ("scanner", 1.3),
        // Creation
        ("create", 1.2), ("build", 1.2), ("generate", 1.2),
        ("créer", 1.2), ("construire", 1.2), ("générer", 1.2),
    ]
    .into_iter()
    .collect();

    /// Common misspellings and their corrected forms
    pub static ref TYPO_CORRECTIONS: HashMap<&'static str, &'static str> = [
        // French
        ("parseur", "parser"),
        ("analyseur", "analyser"),
        ("fusioner", "fusionner"),
        ("remplire", "remplir"),
        ("divizer", "diviser"),
        ("extrair", "extraire"),
        ("lir", "lire"),
        ("verifier", "vérifier"),
        // English
        ("analys", "analyze"),
        ("analize", "analyze"),
        ("examin", "examine"),
        ("proces", "process"),
        ("creat", "create"),
        ("generat", "generate"),
    ]
    .into_iter()
    .collect();
}

/// Multiplier for an analytical verb, if `word` is one
pub fn verb_multiplier(word: &str) -> Option<f64> {
    ANALYTICAL_VERBS.get(word).copied()
}

/// Corrected spelling for a known typo
pub fn typo_correction(word: &str) -> Option<&'static str> {
    TYPO_CORRECTIONS.get(word).copied()
}

/// Analytical verbs among `tokens`, in prompt order
pub fn analytical_verbs<'a>(tokens: &'a [String]) -> Vec<&'a str> {
    tokens
        .iter()
        .map(String::as_str)
        .filter(|t| ANALYTICAL_VERBS.contains_key(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_multipliers_in_range() {
        for (verb, m) in ANALYTICAL_VERBS.iter() {
            assert!((1.2..=1.5).contains(m), "{verb} has {m}");
        }
        assert_eq!(verb_multiplier("analyze"), Some(1.5));
        assert_eq!(verb_multiplier("créer"), Some(1.2));
        assert_eq!(verb_multiplier("deploy"), None);
    }

    #[test]
    fn test_typo_corrections() {
        assert_eq!(typo_correction("analize"), Some("analyze"));
        assert_eq!(typo_correction("excel"), None);
    }

    #[test]
    fn test_analytical_verbs_keeps_order() {
        let tokens: Vec<String> = ["please", "read", "and", "extract"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(analytical_verbs(&tokens), vec!["read", "extract"]);
    }
}
