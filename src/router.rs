//! Prompt → skill routing.
//!
//! All signals feed one additive score per skill:
//! phrase substrings, exact word hits, analytical-verb amplification,
//! typo/edit-distance matches and working-directory boosts. Scores are raw
//! sums, never normalised; only skills at or above `min_score` are ranked.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;
use strsim::levenshtein;
use tracing::{debug, info, warn};

use crate::config::RouterConfig;
use crate::context::{ContextScanner, RoutingContext};
use crate::error::Result;
use crate::index::{load_index, InvertedIndex};
use crate::tables::{typo_correction, verb_multiplier};
use crate::tokenizer::tokenize;

/// Score given to an auto-activated skill
pub const AUTO_ACTIVATE_SCORE: f64 = 1.0;

/// Source tag for an auto-activated skill missing from the index
const AUTO_SOURCE: &str = "context-auto";

/// Acknowledgements that never need a skill
const SIMPLE_PROMPTS: &[&str] = &[
    "continue", "yes", "no", "ok", "okay", "thanks", "sure", "done", "stop", "got it", "yep",
    "nope", "thank you", "thx", "next", "go", "proceed",
];

/// Display confidence: `min(100, round(score × 20))`
pub fn confidence_percent(score: f64) -> u32 {
    ((score * 20.0).round().max(0.0) as u32).min(100)
}

// ============================================================================
// Result Types
// ============================================================================

/// Why a prompt produced no routing at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PromptTooShort,
    SimplePrompt,
    IndexUnavailable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::PromptTooShort => "prompt too short",
            SkipReason::SimplePrompt => "simple prompt",
            SkipReason::IndexUnavailable => "index not available",
        }
    }
}

/// A skill that cleared the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub name: String,
    pub description: String,
    pub source: String,
    pub score: f64,
    /// What contributed to the score (`phrase:`, `word:`, `verb:`, ...)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl RankedMatch {
    pub fn confidence(&self) -> u32 {
        confidence_percent(self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingResult {
    pub matches: Vec<RankedMatch>,
    /// Every skill that scored, including those below the threshold
    pub all_scores: BTreeMap<String, f64>,
    pub auto_activated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reason: Option<String>,
    pub context: RoutingContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub elapsed_ms: f64,
}

impl RoutingResult {
    pub fn skipped(context: RoutingContext, reason: SkipReason) -> Self {
        Self {
            matches: Vec::new(),
            all_scores: BTreeMap::new(),
            auto_activated: false,
            auto_reason: None,
            context,
            skip_reason: Some(reason),
            elapsed_ms: 0.0,
        }
    }

    pub fn top(&self) -> Option<&RankedMatch> {
        self.matches.first()
    }

    /// The `limit` highest scores, same ordering as the ranked matches
    pub fn ranked_scores(&self, limit: usize) -> Vec<(&str, f64)> {
        let mut scores: Vec<(&str, f64)> =
            self.all_scores.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        sort_ranked(&mut scores);
        scores.truncate(limit);
        scores
    }
}

/// Score descending, then skill name ascending
fn sort_ranked(scores: &mut [(&str, f64)]) {
    scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
}

// ============================================================================
// Score Accumulator
// ============================================================================

#[derive(Debug, Default, Clone)]
struct SkillScore {
    score: f64,
    evidence: Vec<String>,
}

/// Per-request score accumulator keyed by skill name
#[derive(Debug, Default, Clone)]
pub struct ScoreBoard {
    entries: HashMap<String, SkillScore>,
}

impl ScoreBoard {
    pub fn add(&mut self, skill: &str, amount: f64, evidence: String) {
        let entry = self.entries.entry(skill.to_string()).or_default();
        entry.score += amount;
        if !entry.evidence.contains(&evidence) {
            entry.evidence.push(evidence);
        }
    }

    /// Replace a skill's score outright
    pub fn set(&mut self, skill: &str, score: f64, evidence: String) {
        let entry = self.entries.entry(skill.to_string()).or_default();
        entry.score = score;
        entry.evidence.push(evidence);
    }

    pub fn score(&self, skill: &str) -> f64 {
        self.entries.get(skill).map_or(0.0, |e| e.score)
    }

    pub fn evidence(&self, skill: &str) -> &[String] {
        self.entries
            .get(skill)
            .map_or(&[][..], |e| e.evidence.as_slice())
    }

    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.score))
            .collect()
    }

    /// Context evidence: add to a skill that already scored, or seed it at
    /// exactly `boost` when the prompt shows analytical intent.
    fn boost_or_seed(&mut self, skill: &str, boost: f64, has_intent: bool, evidence: String) {
        if self.score(skill) > 0.0 {
            self.add(skill, boost, evidence);
        } else if has_intent {
            self.set(skill, boost, evidence);
        }
    }
}

/// Rank the board: drop scores under `min_score`, keep the best `top_k`
pub fn select(
    board: &ScoreBoard,
    index: &InvertedIndex,
    min_score: f64,
    top_k: usize,
) -> Vec<RankedMatch> {
    let mut ranked: Vec<(&str, f64)> = board
        .entries
        .iter()
        .map(|(k, v)| (k.as_str(), v.score))
        .filter(|(_, score)| *score >= min_score)
        .collect();
    sort_ranked(&mut ranked);

    ranked
        .into_iter()
        .take(top_k)
        .map(|(name, score)| {
            let info = index.skill_info(name).cloned().unwrap_or_default();
            RankedMatch {
                name: name.to_string(),
                description: info.description,
                source: info.source,
                score,
                evidence: board.evidence(name).to_vec(),
            }
        })
        .collect()
}

// ============================================================================
// Scoring Pipeline
// ============================================================================

fn score_phrases(
    board: &mut ScoreBoard,
    index: &InvertedIndex,
    prompt_lower: &str,
    config: &RouterConfig,
) {
    let w = &config.weights;
    for (keyword, skills) in &index.keywords {
        if keyword.is_empty() || !prompt_lower.contains(keyword.as_str()) {
            continue;
        }
        let boost = if keyword.contains(' ') {
            w.phrase_boost
        } else {
            w.single_word_phrase_boost
        };
        for (skill, weight) in skills {
            board.add(skill, weight * boost, format!("phrase:{}", keyword));
        }
    }
}

fn score_words(
    board: &mut ScoreBoard,
    index: &InvertedIndex,
    words: &[String],
    config: &RouterConfig,
) {
    for word in words {
        if let Some(skills) = index.lookup(word) {
            for (skill, weight) in skills {
                board.add(skill, weight * config.weights.word_factor, format!("word:{}", word));
            }
        }
    }
}

/// A verb amplifies the word score it already earned
fn apply_verb_boost(
    board: &mut ScoreBoard,
    index: &InvertedIndex,
    words: &[String],
    config: &RouterConfig,
) {
    for word in words {
        let (Some(multiplier), Some(skills)) = (verb_multiplier(word), index.lookup(word)) else {
            continue;
        };
        for (skill, weight) in skills {
            let extra = weight * config.weights.verb_factor * (multiplier - 1.0);
            board.add(skill, extra, format!("verb:{}", word));
        }
    }
}

fn apply_fuzzy_matching(
    board: &mut ScoreBoard,
    index: &InvertedIndex,
    words: &[String],
    config: &RouterConfig,
) {
    let factor = config.weights.fuzzy_factor;
    let t = &config.thresholds;

    for word in words {
        if index.lookup(word).is_some() {
            continue;
        }

        // Typo table first
        if let Some(corrected) = typo_correction(word) {
            if let Some(skills) = index.lookup(corrected) {
                for (skill, weight) in skills {
                    board.add(skill, weight * factor, format!("typo:{}->{}", word, corrected));
                }
                continue;
            }
        }

        let len = word.chars().count();
        if len < t.fuzzy_min_len || len > t.fuzzy_max_len {
            continue;
        }

        for (keyword, skills) in &index.keywords {
            if keyword.chars().count().abs_diff(len) > t.max_edit_distance {
                continue;
            }
            if levenshtein(word, keyword) <= t.max_edit_distance {
                for (skill, weight) in skills {
                    board.add(skill, weight * factor, format!("fuzzy:{}->{}", word, keyword));
                }
                // One keyword per token
                break;
            }
        }
    }
}

fn apply_context_boost(
    board: &mut ScoreBoard,
    context: &RoutingContext,
    config: &RouterConfig,
    has_analytical_verb: bool,
) {
    let boost = config.weights.context_boost;
    let t = &config.thresholds;
    let rules = &config.context_rules;

    for (ext, count) in &context.extensions {
        if *count < t.min_files_for_boost {
            continue;
        }
        if let Some(skills) = rules.extension_skills.get(ext) {
            for skill in skills {
                board.boost_or_seed(skill, boost, has_analytical_verb, format!("context:{}", ext));
            }
        }
    }

    if context.test_files_count >= t.min_files_for_boost {
        board.boost_or_seed(
            &rules.test_skill,
            boost,
            has_analytical_verb,
            "context:tests".to_string(),
        );
    }

    if context.md_files_count >= t.min_markdown_files {
        board.boost_or_seed(
            &rules.documentation_skill,
            boost,
            has_analytical_verb,
            "context:markdown".to_string(),
        );
    }
}

/// Score `prompt` against `index` under `context`.
///
/// Pure: the same inputs always give the same matches and scores.
pub fn route(
    prompt: &str,
    index: &InvertedIndex,
    context: &RoutingContext,
    config: &RouterConfig,
) -> RoutingResult {
    let start = Instant::now();
    let prompt_lower = prompt.to_lowercase();
    let words = tokenize(prompt);
    let mut board = ScoreBoard::default();

    score_phrases(&mut board, index, &prompt_lower, config);
    score_words(&mut board, index, &words, config);
    apply_verb_boost(&mut board, index, &words, config);
    if config.features.fuzzy_match {
        apply_fuzzy_matching(&mut board, index, &words, config);
    }

    let auto = context
        .auto_activate
        .as_deref()
        .filter(|_| config.auto_activate.enabled);

    if let Some(skill) = auto {
        let reason = context.auto_activate_reason.clone();
        board.set(
            skill,
            AUTO_ACTIVATE_SCORE,
            format!("auto:{}", reason.as_deref().unwrap_or("context")),
        );
        let info = index.skill_info(skill).cloned().unwrap_or_default();
        let source = if info.source.is_empty() {
            AUTO_SOURCE.to_string()
        } else {
            info.source
        };

        return RoutingResult {
            matches: vec![RankedMatch {
                name: skill.to_string(),
                description: info.description,
                source,
                score: AUTO_ACTIVATE_SCORE,
                evidence: board.evidence(skill).to_vec(),
            }],
            all_scores: board.snapshot(),
            auto_activated: true,
            auto_reason: reason,
            context: context.clone(),
            skip_reason: None,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
    }

    let has_analytical_verb = words.iter().any(|w| verb_multiplier(w).is_some());
    apply_context_boost(&mut board, context, config, has_analytical_verb);

    let matches = select(&board, index, config.thresholds.min_score, config.thresholds.top_k);

    RoutingResult {
        matches,
        all_scores: board.snapshot(),
        auto_activated: false,
        auto_reason: None,
        context: context.clone(),
        skip_reason: None,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

/// Prompts that are routed to nothing without touching the index
pub fn skip_reason(prompt: &str, min_chars: usize) -> Option<SkipReason> {
    let trimmed = prompt.trim();
    if trimmed.chars().count() < min_chars {
        return Some(SkipReason::PromptTooShort);
    }
    if trimmed.contains("<task-notification>") {
        return Some(SkipReason::SimplePrompt);
    }
    let lower = trimmed.to_lowercase();
    if SIMPLE_PROMPTS.contains(&lower.as_str()) {
        return Some(SkipReason::SimplePrompt);
    }
    None
}

// ============================================================================
// Router
// ============================================================================

/// Holds the loaded index and the context scanner for the process lifetime
#[derive(Debug)]
pub struct Router {
    config: RouterConfig,
    scanner: ContextScanner,
    index: Option<InvertedIndex>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let scanner = ContextScanner::new(
            config.context_rules.clone(),
            config.auto_activate.clone(),
            config.thresholds.clone(),
            config.features.cwd_context,
        );
        Self {
            config,
            scanner,
            index: None,
        }
    }

    /// Router over an already-loaded index (no file lookup)
    pub fn with_index(config: RouterConfig, index: InvertedIndex) -> Self {
        let mut router = Self::new(config);
        router.index = Some(index);
        router
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Drop the cached index; the next request reloads it
    pub fn invalidate(&mut self) {
        self.index = None;
    }

    fn ensure_index(&mut self) -> Result<()> {
        if self.index.is_none() {
            let paths = &self.config.paths;
            let index = load_index(&paths.index_file, Some(&paths.triggers_file))?;
            info!(
                "Loaded index: {} keywords, {} skills",
                index.keywords.len(),
                index.skills.len()
            );
            self.index = Some(index);
        }
        Ok(())
    }

    /// Route one prompt from `cwd`. Never fails: problems yield an empty
    /// result carrying a `skip_reason`.
    pub fn route_prompt(&mut self, prompt: &str, cwd: &Path) -> RoutingResult {
        let start = Instant::now();

        if let Some(reason) = skip_reason(prompt, self.config.thresholds.min_prompt_chars) {
            debug!("Skipping prompt: {}", reason.as_str());
            return RoutingResult::skipped(RoutingContext::empty(cwd), reason);
        }

        if let Err(e) = self.ensure_index() {
            warn!("No routing: {}", e);
            let empty = RoutingContext::empty(cwd);
            let mut result = RoutingResult::skipped(empty, SkipReason::IndexUnavailable);
            result.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            return result;
        }

        let context = self.scanner.scan(cwd);
        let Some(index) = self.index.as_ref() else {
            return RoutingResult::skipped(context, SkipReason::IndexUnavailable);
        };

        let mut result = route(prompt, index, &context, &self.config);
        result.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result.top() {
            Some(top) if result.auto_activated => {
                info!("Auto-activated {} ({:?})", top.name, result.auto_reason)
            }
            Some(top) => info!("Top match: {} (score {:.2})", top.name, top.score),
            None => debug!("No matches found"),
        }
        result
    }
}
