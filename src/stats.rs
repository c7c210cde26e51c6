//! Offline analysis of the routing history and near-miss logs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::logger::{HistoryEntry, NearMissEntry};

/// Top-match confidence at or above this counts as high confidence
pub const HIGH_CONFIDENCE: u32 = 50;

/// Report thresholds that trigger a recommendation
pub const LOW_MATCH_RATE: f64 = 30.0;
pub const MANY_NEAR_MISS_SKILLS: usize = 5;
pub const SLOW_ROUTING_MS: f64 = 50.0;

/// Read a JSON Lines file. A missing file yields no entries; blank and
/// unparsable lines are skipped.
pub fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("Could not read {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping malformed line in {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub matches: usize,
    pub no_match: usize,
}

impl DayStats {
    pub fn match_rate(&self) -> f64 {
        percent(self.matches, self.matches + self.no_match)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub matches: usize,
    pub no_match: usize,
    pub high_confidence: usize,
    pub low_confidence: usize,
    pub match_rate: f64,
    pub avg_confidence: f64,
    pub avg_time: f64,
    /// Times each skill was the top match
    pub skill_hits: BTreeMap<String, usize>,
    /// Keyed by `YYYY-MM-DD`
    pub by_day: BTreeMap<String, DayStats>,
}

impl HistoryStats {
    /// Skills by hit count descending, then name
    pub fn top_skills(&self, limit: usize) -> Vec<(&str, usize)> {
        sorted_counts(&self.skill_hits, limit)
    }

    /// Most recent days first
    pub fn recent_days(&self, limit: usize) -> Vec<(&str, &DayStats)> {
        self.by_day
            .iter()
            .rev()
            .take(limit)
            .map(|(day, stats)| (day.as_str(), stats))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearMissStats {
    /// Number of logged requests with at least one near-miss
    pub total: usize,
    pub by_skill: BTreeMap<String, usize>,
    /// Mean `gap_to_threshold` per skill, in hundredths
    pub avg_gap: BTreeMap<String, f64>,
}

impl NearMissStats {
    pub fn top_skills(&self, limit: usize) -> Vec<(&str, usize)> {
        sorted_counts(&self.by_skill, limit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingStats {
    pub history: HistoryStats,
    pub near_misses: NearMissStats,
}

impl RoutingStats {
    pub fn load(history_file: &Path, near_miss_file: &Path) -> Self {
        let history: Vec<HistoryEntry> = load_jsonl(history_file);
        let near_misses: Vec<NearMissEntry> = load_jsonl(near_miss_file);
        Self {
            history: analyze_history(&history),
            near_misses: analyze_near_misses(&near_misses),
        }
    }

    /// `Match rate: X% | Avg time: Yms | Near-misses: N`
    pub fn summary_line(&self) -> String {
        format!(
            "Match rate: {:.1}% | Avg time: {:.1}ms | Near-misses: {}",
            self.history.match_rate, self.history.avg_time, self.near_misses.total
        )
    }

    /// Tuning advice for the report
    pub fn recommendations(&self) -> Vec<String> {
        let mut advice = Vec::new();
        if self.history.match_rate < LOW_MATCH_RATE {
            advice.push(format!(
                "Match rate is very low (<{:.0}%): lower the threshold or add triggers",
                LOW_MATCH_RATE
            ));
        }
        if self.near_misses.by_skill.len() > MANY_NEAR_MISS_SKILLS {
            let worst: Vec<&str> = self
                .near_misses
                .top_skills(3)
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            advice.push(format!(
                "Many near-misses detected: improve triggers for {}",
                worst.join(", ")
            ));
        }
        if self.history.avg_time > SLOW_ROUTING_MS {
            advice.push(format!(
                "Average routing time is high (>{:.0}ms): rebuild the index or trim skills",
                SLOW_ROUTING_MS
            ));
        }
        advice
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn sorted_counts(counts: &BTreeMap<String, usize>, limit: usize) -> Vec<(&str, usize)> {
    let mut sorted: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sorted.truncate(limit);
    sorted
}

fn day_of(timestamp: &str) -> String {
    match timestamp.split_once('T') {
        Some((day, _)) if !day.is_empty() => day.to_string(),
        _ => "unknown".to_string(),
    }
}

pub fn analyze_history(entries: &[HistoryEntry]) -> HistoryStats {
    let mut stats = HistoryStats {
        total: entries.len(),
        ..HistoryStats::default()
    };
    let mut total_time = 0.0;
    let mut confidence_sum = 0u64;

    for entry in entries {
        total_time += entry.elapsed_ms;
        let day = stats.by_day.entry(day_of(&entry.timestamp)).or_default();

        match entry.matches.first() {
            Some(top) => {
                stats.matches += 1;
                day.matches += 1;
                *stats.skill_hits.entry(top.name.clone()).or_insert(0) += 1;
                if top.confidence >= HIGH_CONFIDENCE {
                    stats.high_confidence += 1;
                } else {
                    stats.low_confidence += 1;
                }
                confidence_sum += u64::from(top.confidence);
            }
            None => {
                stats.no_match += 1;
                day.no_match += 1;
            }
        }
    }

    stats.match_rate = percent(stats.matches, stats.total);
    if stats.total > 0 {
        stats.avg_time = total_time / stats.total as f64;
    }
    if stats.matches > 0 {
        stats.avg_confidence = confidence_sum as f64 / stats.matches as f64;
    }
    stats
}

pub fn analyze_near_misses(entries: &[NearMissEntry]) -> NearMissStats {
    let mut stats = NearMissStats {
        total: entries.len(),
        ..NearMissStats::default()
    };
    let mut gap_sums: BTreeMap<String, i64> = BTreeMap::new();

    for miss in entries.iter().flat_map(|e| &e.near_misses) {
        *stats.by_skill.entry(miss.name.clone()).or_insert(0) += 1;
        *gap_sums.entry(miss.name.clone()).or_insert(0) += miss.gap_to_threshold;
    }

    stats.avg_gap = gap_sums
        .into_iter()
        .map(|(name, sum)| {
            let count = stats.by_skill.get(&name).copied().unwrap_or(1).max(1);
            (name, sum as f64 / count as f64)
        })
        .collect();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{HistoryContext, HistoryMatch, NearMiss};
    use tempfile::TempDir;

    fn history(timestamp: &str, top: Option<(&str, u32)>, elapsed_ms: f64) -> HistoryEntry {
        HistoryEntry {
            timestamp: timestamp.to_string(),
            prompt_hash: "0123456789abcdef".to_string(),
            prompt_length: 20,
            matches: top
                .map(|(name, confidence)| {
                    vec![HistoryMatch {
                        name: name.to_string(),
                        score: confidence as f64 / 20.0,
                        confidence,
                    }]
                })
                .unwrap_or_default(),
            context: HistoryContext::default(),
            elapsed_ms,
            top_match_confidence: top.map_or(0, |(_, c)| c),
        }
    }

    fn near_miss_entry(misses: &[(&str, i64)]) -> NearMissEntry {
        NearMissEntry {
            timestamp: "2026-03-02T10:00:00.000Z".to_string(),
            prompt_hash: "0123456789abcdef".to_string(),
            prompt_preview: "something".to_string(),
            near_misses: misses
                .iter()
                .map(|(name, gap)| NearMiss {
                    name: name.to_string(),
                    score: 0.25 - *gap as f64 / 100.0,
                    gap_to_threshold: *gap,
                })
                .collect(),
            elapsed_ms: 1.0,
        }
    }

    #[test]
    fn test_analyze_history() {
        let entries = vec![
            history("2026-03-01T09:00:00.000Z", Some(("office-pdf", 80)), 4.0),
            history("2026-03-01T10:00:00.000Z", Some(("office-pdf", 30)), 6.0),
            history("2026-03-02T10:00:00.000Z", Some(("office-xlsx", 100)), 2.0),
            history("2026-03-02T11:00:00.000Z", None, 8.0),
        ];
        let stats = analyze_history(&entries);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.matches, 3);
        assert_eq!(stats.no_match, 1);
        assert_eq!(stats.high_confidence, 2);
        assert_eq!(stats.low_confidence, 1);
        assert_eq!(stats.match_rate, 75.0);
        assert_eq!(stats.avg_time, 5.0);
        assert_eq!(stats.avg_confidence, 70.0);
        assert_eq!(stats.top_skills(15), vec![("office-pdf", 2), ("office-xlsx", 1)]);

        let days = stats.recent_days(7);
        assert_eq!(days[0].0, "2026-03-02");
        assert_eq!(days[0].1.match_rate(), 50.0);
        assert_eq!(days[1].0, "2026-03-01");
    }

    #[test]
    fn test_analyze_empty_history() {
        let stats = analyze_history(&[]);
        assert_eq!(stats.match_rate, 0.0);
        assert_eq!(stats.avg_time, 0.0);
        assert_eq!(stats.avg_confidence, 0.0);
    }

    #[test]
    fn test_analyze_near_misses() {
        let entries = vec![
            near_miss_entry(&[("office-docx", 5), ("git-commit", 10)]),
            near_miss_entry(&[("office-docx", 1)]),
        ];
        let stats = analyze_near_misses(&entries);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_skill["office-docx"], 2);
        assert_eq!(stats.avg_gap["office-docx"], 3.0);
        assert_eq!(stats.avg_gap["git-commit"], 10.0);
        assert_eq!(stats.top_skills(1), vec![("office-docx", 2)]);
    }

    #[test]
    fn test_load_jsonl_skips_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&history("2026-03-01T09:00:00Z", None, 1.0)).unwrap();
        fs::write(&path, format!("{}\nnot json\n\n{}\n", good, good)).unwrap();

        let entries: Vec<HistoryEntry> = load_jsonl(&path);
        assert_eq!(entries.len(), 2);

        let missing: Vec<HistoryEntry> = load_jsonl(&dir.path().join("missing.jsonl"));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_summary_and_recommendations() {
        let stats = RoutingStats {
            history: analyze_history(&[
                history("2026-03-01T09:00:00Z", None, 60.0),
                history("2026-03-01T09:01:00Z", None, 60.0),
            ]),
            near_misses: analyze_near_misses(&[near_miss_entry(&[
                ("a", 1),
                ("b", 1),
                ("c", 2),
                ("d", 2),
                ("e", 3),
                ("f", 3),
            ])]),
        };
        assert_eq!(
            stats.summary_line(),
            "Match rate: 0.0% | Avg time: 60.0ms | Near-misses: 1"
        );
        let advice = stats.recommendations();
        assert_eq!(advice.len(), 3);
        assert!(advice[1].ends_with("a, b, c"));
    }
}
