//! Routing logs for offline analysis.
//!
//! Three independent outputs, each best-effort:
//! - `last-routing.json`: overwritten every call
//! - `routing-history.jsonl`: one line per call, prompt stored only as a hash
//! - `near-misses.jsonl`: skills that scored just under the threshold

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use crate::config::{RouterConfig, RouterPaths};
use crate::router::{confidence_percent, RoutingResult};

/// Characters of the prompt kept in the last-routing snapshot
const SNAPSHOT_PROMPT_CHARS: usize = 200;

/// Characters of the prompt kept in a near-miss entry
const NEAR_MISS_PREVIEW_CHARS: usize = 100;

/// Hex characters of the prompt hash
const PROMPT_HASH_LEN: usize = 16;

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deterministic salted hash of a prompt (first 16 hex chars of SHA-256)
pub fn prompt_hash(salt: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(prompt.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
        .chars()
        .take(PROMPT_HASH_LEN)
        .collect()
}

// ============================================================================
// Log Entry Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMatch {
    pub name: String,
    /// Score × 100, rounded
    pub score: i64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRouting {
    pub timestamp: String,
    pub prompt: String,
    pub matches: Vec<SnapshotMatch>,
    pub elapsed_ms: f64,
    pub match_count: usize,
    #[serde(default)]
    pub auto_activated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMatch {
    pub name: String,
    pub score: f64,
    pub confidence: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryContext {
    pub has_context_files: bool,
    pub file_extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub prompt_hash: String,
    pub prompt_length: usize,
    #[serde(default)]
    pub matches: Vec<HistoryMatch>,
    #[serde(default)]
    pub context: HistoryContext,
    #[serde(default)]
    pub elapsed_ms: f64,
    #[serde(default)]
    pub top_match_confidence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearMiss {
    pub name: String,
    pub score: f64,
    /// Distance to the threshold in hundredths
    pub gap_to_threshold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearMissEntry {
    pub timestamp: String,
    pub prompt_hash: String,
    pub prompt_preview: String,
    #[serde(default)]
    pub near_misses: Vec<NearMiss>,
    #[serde(default)]
    pub elapsed_ms: f64,
}

/// Skills in `[floor, min_score)`, best first, at most `limit`
pub fn near_misses(
    result: &RoutingResult,
    floor: f64,
    min_score: f64,
    limit: usize,
) -> Vec<NearMiss> {
    let mut candidates: Vec<(&str, f64)> = result
        .all_scores
        .iter()
        .filter(|(_, score)| **score >= floor && **score < min_score)
        .map(|(name, score)| (name.as_str(), *score))
        .collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    candidates
        .into_iter()
        .take(limit)
        .map(|(name, score)| NearMiss {
            name: name.to_string(),
            score: round2(score),
            gap_to_threshold: ((min_score - score) * 100.0).round() as i64,
        })
        .collect()
}

// ============================================================================
// Logger
// ============================================================================

pub struct RoutingLogger {
    paths: RouterPaths,
    salt: String,
    min_score: f64,
    near_miss_floor: f64,
    near_miss_limit: usize,
}

impl RoutingLogger {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            paths: config.paths.clone(),
            salt: config.history_salt.clone(),
            min_score: config.thresholds.min_score,
            near_miss_floor: config.thresholds.near_miss_floor,
            near_miss_limit: config.thresholds.near_miss_limit,
        }
    }

    /// Write all three logs. Failures are logged at debug level and ignored.
    pub fn record(&self, prompt: &str, result: &RoutingResult) {
        if let Err(e) = self.save_last_routing(prompt, result) {
            debug!("Could not save last routing: {}", e);
        }
        if let Err(e) = self.append_history(prompt, result) {
            debug!("Could not append routing history: {}", e);
        }
        if let Err(e) = self.append_near_misses(prompt, result) {
            debug!("Could not append near-misses: {}", e);
        }
    }

    pub fn last_routing_entry(&self, prompt: &str, result: &RoutingResult) -> LastRouting {
        LastRouting {
            timestamp: now_rfc3339(),
            prompt: truncate_chars(prompt, SNAPSHOT_PROMPT_CHARS),
            matches: result
                .matches
                .iter()
                .map(|m| SnapshotMatch {
                    name: m.name.clone(),
                    score: (m.score * 100.0).round() as i64,
                    source: m.source.clone(),
                })
                .collect(),
            elapsed_ms: result.elapsed_ms,
            match_count: result.matches.len(),
            auto_activated: result.auto_activated,
        }
    }

    pub fn history_entry(&self, prompt: &str, result: &RoutingResult) -> HistoryEntry {
        let extensions = &result.context.extensions;
        HistoryEntry {
            timestamp: now_rfc3339(),
            prompt_hash: prompt_hash(&self.salt, prompt),
            prompt_length: prompt.chars().count(),
            matches: result
                .matches
                .iter()
                .map(|m| HistoryMatch {
                    name: m.name.clone(),
                    score: round2(m.score),
                    confidence: m.confidence(),
                })
                .collect(),
            context: HistoryContext {
                has_context_files: !extensions.is_empty(),
                file_extensions: extensions.keys().cloned().collect(),
            },
            elapsed_ms: result.elapsed_ms,
            top_match_confidence: result.top().map_or(0, |m| confidence_percent(m.score)),
        }
    }

    /// `None` when nothing fell in the near-miss band
    pub fn near_miss_entry(&self, prompt: &str, result: &RoutingResult) -> Option<NearMissEntry> {
        let misses = near_misses(
            result,
            self.near_miss_floor,
            self.min_score,
            self.near_miss_limit,
        );
        if misses.is_empty() {
            return None;
        }
        Some(NearMissEntry {
            timestamp: now_rfc3339(),
            prompt_hash: prompt_hash(&self.salt, prompt),
            prompt_preview: truncate_chars(prompt, NEAR_MISS_PREVIEW_CHARS),
            near_misses: misses,
            elapsed_ms: result.elapsed_ms,
        })
    }

    fn save_last_routing(&self, prompt: &str, result: &RoutingResult) -> io::Result<()> {
        let entry = self.last_routing_entry(prompt, result);
        let path = &self.paths.last_routing_file;
        ensure_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(&entry)?)
    }

    fn append_history(&self, prompt: &str, result: &RoutingResult) -> io::Result<()> {
        let entry = self.history_entry(prompt, result);
        append_json_line(&self.paths.history_file, &entry)
    }

    fn append_near_misses(&self, prompt: &str, result: &RoutingResult) -> io::Result<()> {
        match self.near_miss_entry(prompt, result) {
            Some(entry) => append_json_line(&self.paths.near_miss_file, &entry),
            None => Ok(()),
        }
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    ensure_parent(path)?;
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?
        .write_all(line.as_bytes())
}
