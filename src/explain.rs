//! Human-readable rationale for a routing decision.

use serde::Serialize;

use crate::router::RoutingResult;
use crate::tables::{analytical_verbs, typo_correction};
use crate::tokenizer::tokenize;

/// Used when no specific reason applies
pub const GENERIC_REASON: &str = "Keyword and trigger matching";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub auto_activated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reason: Option<String>,
    /// e.g. "3 .pdf files, 1 .md file"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    /// (typo, correction) pairs found in the prompt
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub typo_corrections: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub analytical_verbs: Vec<String>,
    /// Why the top match won; absent when auto-activated or unmatched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Explanation {
    /// Bullet lines for the typo and verb findings
    pub fn enhancements(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .typo_corrections
            .iter()
            .map(|(typo, fixed)| format!("\"{}\" → \"{}\" (typo corrected)", typo, fixed))
            .collect();
        if !self.analytical_verbs.is_empty() {
            lines.push(format!(
                "Detected analytical intent: {}",
                self.analytical_verbs.join(", ")
            ));
        }
        lines
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count > 1 {
        format!("{} {}s", count, noun)
    } else {
        format!("{} {}", count, noun)
    }
}

/// Summarise the extension histogram, e.g. "3 .pdf files, 1 .md file"
pub fn describe_extensions(result: &RoutingResult) -> Option<String> {
    let extensions = &result.context.extensions;
    if extensions.is_empty() {
        return None;
    }
    Some(
        extensions
            .iter()
            .map(|(ext, count)| plural(*count, &format!("{} file", ext)))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// First applicable reason: explicit keyword, then context, then verbs
fn top_match_reason(result: &RoutingResult, verbs: &[String]) -> String {
    let Some(top) = result.top() else {
        return GENERIC_REASON.to_string();
    };

    // Longest phrase is the most specific mention
    let phrase = top
        .evidence
        .iter()
        .filter_map(|e| e.strip_prefix("phrase:"))
        .max_by_key(|p| p.chars().count());
    if let Some(phrase) = phrase {
        return format!("Explicit keyword match (\"{}\")", phrase);
    }

    if let Some(ext) = top.evidence.iter().find_map(|e| e.strip_prefix("context:")) {
        return match ext {
            "tests" => "Context boost from test files in directory".to_string(),
            "markdown" => "Context boost from Markdown files in directory".to_string(),
            _ => format!("Context boost from {} files in directory", ext),
        };
    }

    if !verbs.is_empty() {
        return format!("Analytical verbs boost ({})", verbs.join(", "));
    }

    GENERIC_REASON.to_string()
}

/// Build the explanation for `result`. Pure: no I/O.
pub fn explain(prompt: &str, result: &RoutingResult) -> Explanation {
    let tokens = tokenize(prompt);
    let verbs: Vec<String> = analytical_verbs(&tokens)
        .into_iter()
        .map(str::to_string)
        .collect();
    let typo_corrections = tokens
        .iter()
        .filter_map(|t| typo_correction(t).map(|fixed| (t.clone(), fixed.to_string())))
        .collect();

    let mut hints = result.context.hints.clone();
    // A context candidate that the policy kept from auto-activating
    if let Some(candidate) = &result.context.auto_activate {
        if !result.auto_activated && !hints.contains(candidate) {
            hints.push(candidate.clone());
        }
    }

    let reasoning = if !result.auto_activated && !result.matches.is_empty() {
        Some(top_match_reason(result, &verbs))
    } else {
        None
    };

    Explanation {
        auto_activated: result.auto_activated,
        auto_reason: result.auto_reason.clone(),
        context_summary: describe_extensions(result),
        hints,
        typo_corrections,
        analytical_verbs: verbs,
        reasoning,
    }
}
