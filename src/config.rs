//! Router configuration: scoring weights, thresholds, feature flags and
//! file locations. Defaults mirror the tuned production values; a handful
//! of environment variables can override them at startup.

use std::env;
use std::path::{Path, PathBuf};

use crate::context::ContextRules;
use crate::error::{Result, RouterError};

/// Directory name under the Claude home holding the index and routing logs
const CACHE_DIR: &str = "cache";

/// Default index file name
const INDEX_FILE: &str = "keyword-index.json";

/// Default trigger registry file name
const TRIGGERS_FILE: &str = "skill-triggers.json";

// ============================================================================
// Scoring Weights
// ============================================================================

/// Multipliers applied by the scoring pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    /// Multi-word keyword found as a substring of the prompt
    pub phrase_boost: f64,
    /// Single-word keyword found as a substring of the prompt
    pub single_word_phrase_boost: f64,
    /// Prompt token equal to an indexed keyword
    pub word_factor: f64,
    /// Share of the word score a recognised verb amplifies
    pub verb_factor: f64,
    /// Typo-table or edit-distance match
    pub fuzzy_factor: f64,
    /// Flat boost from working-directory evidence
    pub context_boost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            phrase_boost: 1.5,
            single_word_phrase_boost: 1.0,
            word_factor: 0.5,
            verb_factor: 0.5,
            fuzzy_factor: 0.3,
            context_boost: 0.7,
        }
    }
}

// ============================================================================
// Thresholds
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Scores below this never reach the ranked result
    pub min_score: f64,
    /// Maximum number of ranked matches
    pub top_k: usize,
    /// Lower bound of the near-miss band `[near_miss_floor, min_score)`
    pub near_miss_floor: f64,
    /// Maximum near-misses logged per request
    pub near_miss_limit: usize,
    /// Minimum files of one extension before the extension boosts a skill
    pub min_files_for_boost: usize,
    /// Minimum Markdown files for a documentation-heavy project
    pub min_markdown_files: usize,
    /// Prompts shorter than this (in characters) are not routed
    pub min_prompt_chars: usize,
    /// Maximum Levenshtein distance for a fuzzy match
    pub max_edit_distance: usize,
    /// Token length window for edit-distance matching
    pub fuzzy_min_len: usize,
    pub fuzzy_max_len: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_score: 0.25,
            top_k: 2,
            near_miss_floor: 0.10,
            near_miss_limit: 5,
            min_files_for_boost: 3,
            min_markdown_files: 5,
            min_prompt_chars: 3,
            max_edit_distance: 1,
            fuzzy_min_len: 4,
            fuzzy_max_len: 10,
        }
    }
}

// ============================================================================
// Feature Flags & Auto-Activation Policy
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFlags {
    /// Scan the working directory for context signals
    pub cwd_context: bool,
    /// Typo table and edit-distance matching
    pub fuzzy_match: bool,
    /// Print the top-10 ranking with the analysis
    pub verbose_routing: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            cwd_context: true,
            fuzzy_match: true,
            verbose_routing: true,
        }
    }
}

/// Which context rules may auto-activate a skill.
///
/// `enabled` is the master switch consulted by the router; the per-rule
/// switches are consulted by the context scanner. Off by default: directory
/// evidence alone produced too many false positives.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoActivatePolicy {
    pub enabled: bool,
    pub path_rules: bool,
    pub file_rules: bool,
    pub folder_rules: bool,
    pub dialect_detection: bool,
    pub documentation_heavy: bool,
}

impl Default for AutoActivatePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            path_rules: true,
            file_rules: true,
            folder_rules: true,
            dialect_detection: true,
            documentation_heavy: true,
        }
    }
}

impl AutoActivatePolicy {
    /// Every rule on, master switch on.
    pub fn all_enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

// ============================================================================
// File Locations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RouterPaths {
    pub index_file: PathBuf,
    pub triggers_file: PathBuf,
    pub last_routing_file: PathBuf,
    pub history_file: PathBuf,
    pub near_miss_file: PathBuf,
}

impl RouterPaths {
    /// Standard layout under a Claude home directory
    pub fn under(claude_home: &Path) -> Self {
        let cache = claude_home.join(CACHE_DIR);
        Self {
            index_file: cache.join(INDEX_FILE),
            triggers_file: claude_home.join("registry").join(TRIGGERS_FILE),
            last_routing_file: cache.join("last-routing.json"),
            history_file: cache.join("routing-history.jsonl"),
            near_miss_file: cache.join("near-misses.jsonl"),
        }
    }

    /// Candidate registry locations searched by `build-index`, in order
    pub fn trigger_candidates(claude_home: &Path) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(cwd) = env::current_dir() {
            candidates.push(cwd.join("registry").join(TRIGGERS_FILE));
        }
        candidates.push(claude_home.join("registry").join(TRIGGERS_FILE));
        candidates.push(claude_home.join("configs").join(TRIGGERS_FILE));
        candidates
    }
}

/// Resolve the Claude home directory (`ROUTER_HOME` or `~/.claude`)
pub fn claude_home() -> Result<PathBuf> {
    if let Ok(home) = env::var("ROUTER_HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    let home = dirs::home_dir().ok_or(RouterError::NoHomeDir)?;
    Ok(home.join(".claude"))
}

// ============================================================================
// Router Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    pub weights: ScoringWeights,
    pub thresholds: Thresholds,
    pub features: FeatureFlags,
    pub auto_activate: AutoActivatePolicy,
    pub context_rules: ContextRules,
    pub paths: RouterPaths,
    /// Salt mixed into the prompt hash stored in routing history
    pub history_salt: String,
}

impl RouterConfig {
    /// Defaults with every file placed under `claude_home`
    pub fn with_home(claude_home: &Path) -> Self {
        Self {
            weights: ScoringWeights::default(),
            thresholds: Thresholds::default(),
            features: FeatureFlags::default(),
            auto_activate: AutoActivatePolicy::default(),
            context_rules: ContextRules::default(),
            paths: RouterPaths::under(claude_home),
            history_salt: String::new(),
        }
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::with_home(&claude_home()?);
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled_unless_false = |key: &str, current: bool| match lookup(key) {
            Some(v) => v != "false",
            None => current,
        };
        let features = &mut self.features;
        features.cwd_context = enabled_unless_false("ROUTER_CWD_CONTEXT", features.cwd_context);
        features.fuzzy_match = enabled_unless_false("ROUTER_FUZZY_MATCH", features.fuzzy_match);
        features.verbose_routing =
            enabled_unless_false("VERBOSE_ROUTING", features.verbose_routing);

        if let Some(v) = lookup("ROUTER_AUTO_ACTIVATE") {
            self.auto_activate.enabled = v == "true";
        }
        if let Some(salt) = lookup("ROUTER_HISTORY_SALT") {
            self.history_salt = salt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::with_home(Path::new("/tmp/claude"));
        assert_eq!(config.thresholds.min_score, 0.25);
        assert_eq!(config.thresholds.top_k, 2);
        assert_eq!(config.weights.context_boost, 0.7);
        assert!(!config.auto_activate.enabled);
        assert_eq!(
            config.paths.index_file,
            PathBuf::from("/tmp/claude/cache/keyword-index.json")
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ROUTER_CWD_CONTEXT", "false"),
            ("ROUTER_FUZZY_MATCH", "yes"),
            ("ROUTER_AUTO_ACTIVATE", "true"),
            ("ROUTER_HISTORY_SALT", "pepper"),
        ]
        .into_iter()
        .collect();

        let mut config = RouterConfig::with_home(Path::new("/tmp/claude"));
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert!(!config.features.cwd_context);
        assert!(config.features.fuzzy_match);
        assert!(config.features.verbose_routing);
        assert!(config.auto_activate.enabled);
        assert_eq!(config.history_salt, "pepper");
    }
}
