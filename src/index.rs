//! Inverted keyword index built from the skill trigger registry.
//!
//! Each trigger phrase is registered whole (weight 1.0) and word by word
//! (0.3 per word of 3+ chars); description words of 4+ chars add a weak
//! 0.1. Weights for the same keyword/skill pair are summed, then every
//! keyword keeps only its 5 strongest skills.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

use crate::error::{Result, RouterError};
use crate::tokenizer::unique_tokens;

/// Index format version written by `build_index`
pub const INDEX_VERSION: &str = "1.0.0";

/// Weight of a full trigger phrase
pub const PHRASE_WEIGHT: f64 = 1.0;

/// Weight of a single word taken from a trigger phrase
pub const TRIGGER_WORD_WEIGHT: f64 = 0.3;

/// Weight of a word taken from the skill description
pub const DESCRIPTION_WORD_WEIGHT: f64 = 0.1;

/// Maximum skills kept per keyword
pub const MAX_SKILLS_PER_KEYWORD: usize = 5;

/// Stored descriptions are cut to this many characters
const MAX_DESCRIPTION_CHARS: usize = 100;

/// Trigger words shorter than this are not indexed on their own
const MIN_TRIGGER_WORD_CHARS: usize = 3;

/// Description words shorter than this are not indexed
const MIN_DESCRIPTION_WORD_CHARS: usize = 4;

/// Index and trigger file mtimes may differ by this much and still be fresh
const FRESHNESS_TOLERANCE_SECS: f64 = 1.0;

// ============================================================================
// Registry Types
// ============================================================================

/// A skill as described by the discovery pipeline
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SkillDescriptor {
    /// Unique skill identifier
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Phrases that strongly indicate this skill
    #[serde(default)]
    pub triggers: Vec<String>,

    /// Provenance tag (global, project:<name>, plugin, ...)
    #[serde(default)]
    pub source: String,
}

/// The skill-triggers.json registry. Entries stay as raw JSON so a single
/// malformed skill can be skipped without rejecting the file.
#[derive(Debug, Deserialize)]
pub struct TriggerRegistry {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub skills: Vec<serde_json::Value>,
}

impl TriggerRegistry {
    /// Well-formed descriptors; malformed entries are logged and skipped
    pub fn descriptors(&self) -> Vec<SkillDescriptor> {
        self.skills
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| match SkillDescriptor::deserialize(raw) {
                Ok(skill) if !skill.name.trim().is_empty() => Some(skill),
                Ok(_) => {
                    warn!("Skipping registry entry {}: missing name", i);
                    None
                }
                Err(e) => {
                    warn!("Skipping malformed registry entry {}: {}", i, e);
                    None
                }
            })
            .collect()
    }
}

// ============================================================================
// Index Types
// ============================================================================

/// Per-skill metadata carried by the index
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SkillInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
}

/// keyword → [(skill, weight)] lookup plus skill metadata
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InvertedIndex {
    #[serde(default)]
    pub version: String,

    /// Sorted by weight descending, at most `MAX_SKILLS_PER_KEYWORD` each
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<(String, f64)>>,

    #[serde(default)]
    pub skills: BTreeMap<String, SkillInfo>,

    /// mtime (seconds since epoch) of the registry the index was built from
    #[serde(default)]
    pub triggers_mtime: f64,
}

impl InvertedIndex {
    /// Skills credited by `keyword`, if indexed
    pub fn lookup(&self, keyword: &str) -> Option<&[(String, f64)]> {
        self.keywords.get(keyword).map(Vec::as_slice)
    }

    pub fn skill_info(&self, name: &str) -> Option<&SkillInfo> {
        self.skills.get(name)
    }

    /// Whether the index matches a registry with mtime `triggers_mtime`
    pub fn is_fresh(&self, triggers_mtime: f64) -> bool {
        (self.triggers_mtime - triggers_mtime).abs() <= FRESHNESS_TOLERANCE_SECS
    }
}

// ============================================================================
// Index Building
// ============================================================================

/// Accumulates raw keyword contributions before ranking
#[derive(Default)]
struct KeywordAccumulator {
    weights: BTreeMap<String, HashMap<String, f64>>,
}

impl KeywordAccumulator {
    fn add(&mut self, keyword: &str, skill: &str, weight: f64) {
        *self
            .weights
            .entry(keyword.to_string())
            .or_default()
            .entry(skill.to_string())
            .or_insert(0.0) += weight;
    }

    fn finish(self) -> BTreeMap<String, Vec<(String, f64)>> {
        self.weights
            .into_iter()
            .map(|(keyword, skills)| {
                let mut ranked: Vec<(String, f64)> = skills.into_iter().collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                ranked.truncate(MAX_SKILLS_PER_KEYWORD);
                (keyword, ranked)
            })
            .collect()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Build the inverted index from skill descriptors.
///
/// Fails only when there is nothing to index. `triggers_mtime` is left at 0;
/// `build_index_from_file` stamps it.
pub fn build_index(skills: &[SkillDescriptor]) -> Result<InvertedIndex> {
    if skills.is_empty() {
        return Err(RouterError::NoSkills);
    }

    let mut acc = KeywordAccumulator::default();
    let mut info = BTreeMap::new();

    for skill in skills {
        let name = skill.name.as_str();
        info.insert(
            name.to_string(),
            SkillInfo {
                description: truncate_chars(&skill.description, MAX_DESCRIPTION_CHARS),
                source: skill.source.clone(),
            },
        );

        if skill.triggers.is_empty() {
            debug!("Skill {} has no triggers", name);
        }

        for trigger in &skill.triggers {
            let phrase = trigger.trim().to_lowercase();
            if phrase.is_empty() {
                continue;
            }
            acc.add(&phrase, name, PHRASE_WEIGHT);

            for word in unique_tokens(&phrase) {
                if word.chars().count() >= MIN_TRIGGER_WORD_CHARS {
                    acc.add(&word, name, TRIGGER_WORD_WEIGHT);
                }
            }
        }

        for word in unique_tokens(&skill.description) {
            if word.chars().count() >= MIN_DESCRIPTION_WORD_CHARS {
                acc.add(&word, name, DESCRIPTION_WORD_WEIGHT);
            }
        }
    }

    Ok(InvertedIndex {
        version: INDEX_VERSION.to_string(),
        keywords: acc.finish(),
        skills: info,
        triggers_mtime: 0.0,
    })
}

// ============================================================================
// File I/O
// ============================================================================

/// Modification time in seconds since the Unix epoch
pub fn file_mtime(path: &Path) -> io::Result<f64> {
    let modified = fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(since_epoch.as_secs_f64())
}

/// First candidate path that exists
pub fn find_triggers_file(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| RouterError::TriggersNotFound(candidates.to_vec()))
}

pub fn load_registry(path: &Path) -> Result<TriggerRegistry> {
    let content = fs::read_to_string(path).map_err(|e| RouterError::RegistryRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| RouterError::RegistryParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read a registry, build its index and stamp the registry mtime
pub fn build_index_from_file(triggers_path: &Path) -> Result<InvertedIndex> {
    let registry = load_registry(triggers_path)?;
    let skills = registry.descriptors();
    info!(
        "Registry {} (v{}): {} usable of {} entries",
        triggers_path.display(),
        registry.version,
        skills.len(),
        registry.skills.len()
    );

    let mut index = build_index(&skills)?;
    index.triggers_mtime = file_mtime(triggers_path).map_err(|e| RouterError::RegistryRead {
        path: triggers_path.to_path_buf(),
        source: e,
    })?;
    Ok(index)
}

pub fn save_index(index: &InvertedIndex, path: &Path) -> Result<()> {
    let write_err = |e: io::Error| RouterError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(index)
        .map_err(|e| RouterError::IndexParse(e.to_string()))?;
    fs::write(path, json).map_err(write_err)
}

/// Load the index, rejecting it when it is stale relative to `triggers_path`.
/// A missing trigger file skips the freshness check.
pub fn load_index(path: &Path, triggers_path: Option<&Path>) -> Result<InvertedIndex> {
    if !path.exists() {
        return Err(RouterError::IndexNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| RouterError::IndexRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let index: InvertedIndex =
        serde_json::from_str(&content).map_err(|e| RouterError::IndexParse(e.to_string()))?;

    if let Some(triggers) = triggers_path.filter(|p| p.exists()) {
        let current = file_mtime(triggers).map_err(|e| RouterError::IndexRead {
            path: triggers.to_path_buf(),
            source: e,
        })?;
        if !index.is_fresh(current) {
            return Err(RouterError::StaleIndex {
                index_mtime: index.triggers_mtime,
                triggers_mtime: current,
            });
        }
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn skill(name: &str, description: &str, triggers: &[&str]) -> SkillDescriptor {
        SkillDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            source: "global".to_string(),
        }
    }

    fn weight_of(index: &InvertedIndex, keyword: &str, skill: &str) -> Option<f64> {
        index
            .lookup(keyword)?
            .iter()
            .find(|(name, _)| name == skill)
            .map(|(_, w)| *w)
    }

    #[test]
    fn test_phrase_and_word_weights() {
        let index =
            build_index(&[skill("office-xlsx", "Spreadsheets", &["create excel file"])]).unwrap();

        assert_eq!(weight_of(&index, "create excel file", "office-xlsx"), Some(1.0));
        for word in ["create", "excel", "file"] {
            assert_eq!(weight_of(&index, word, "office-xlsx"), Some(0.3), "{word}");
        }
    }

    #[test]
    fn test_short_words_not_indexed() {
        let index = build_index(&[skill("pdf", "to do it", &["go to pdf"])]).unwrap();
        assert!(index.lookup("go").is_none());
        assert!(index.lookup("to").is_none());
        assert!(index.lookup("pdf").is_some());
        // Description words need 4+ chars
        assert!(index.lookup("do").is_none());
    }

    #[test]
    fn test_weights_are_summed_not_overwritten() {
        let index = build_index(&[skill(
            "office-xlsx",
            "Excel workbook editing",
            &["excel", "excel chart"],
        )])
        .unwrap();

        // phrase 1.0 + word from "excel" 0.3 + word from "excel chart" 0.3 + description 0.1
        let w = weight_of(&index, "excel", "office-xlsx").unwrap();
        assert!((w - 1.7).abs() < 1e-9, "got {w}");
        let workbook = weight_of(&index, "workbook", "office-xlsx").unwrap();
        assert!((workbook - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_lists_capped_at_five() {
        let skills: Vec<SkillDescriptor> = (0..8)
            .map(|i| {
                let triggers: Vec<&str> = if i < 3 {
                    vec!["report", "report"]
                } else {
                    vec!["report"]
                };
                skill(&format!("skill-{i}"), "", &triggers)
            })
            .collect();
        let index = build_index(&skills).unwrap();

        let list = index.lookup("report").unwrap();
        assert_eq!(list.len(), 5);
        // Skills with the duplicated trigger rank first
        let top: Vec<&str> = list.iter().take(3).map(|(n, _)| n.as_str()).collect();
        assert_eq!(top, vec!["skill-0", "skill-1", "skill-2"]);
        for pair in list.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        for keyword_list in index.keywords.values() {
            assert!(keyword_list.len() <= MAX_SKILLS_PER_KEYWORD);
        }
    }

    #[test]
    fn test_skill_without_triggers_keeps_metadata() {
        let index = build_index(&[skill("bare", "", &[])]).unwrap();
        assert!(index.keywords.is_empty());
        assert!(index.skill_info("bare").is_some());
    }

    #[test]
    fn test_description_truncated() {
        let long = "x".repeat(250);
        let index = build_index(&[skill("long", &long, &["long"])]).unwrap();
        assert_eq!(index.skill_info("long").unwrap().description.chars().count(), 100);
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(build_index(&[]), Err(RouterError::NoSkills)));
    }

    #[test]
    fn test_registry_skips_malformed_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skill-triggers.json");
        fs::write(
            &path,
            r#"{"version": "2.0", "skills": [
                {"name": "ok", "triggers": ["fichier excel"],
                 "description": "Excel", "source": "global"},
                {"name": "broken", "triggers": "not-a-list"},
                {"triggers": ["nameless"]},
                42
            ]}"#,
        )
        .unwrap();

        let index = build_index_from_file(&path).unwrap();
        assert_eq!(index.skills.len(), 1);
        assert!(index.lookup("fichier excel").is_some());
        assert!(index.triggers_mtime > 0.0);
    }

    #[test]
    fn test_registry_without_usable_skills_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skill-triggers.json");
        fs::write(&path, r#"{"version": "2.0", "skills": [{"triggers": []}]}"#).unwrap();
        assert!(matches!(build_index_from_file(&path), Err(RouterError::NoSkills)));

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            build_index_from_file(&path),
            Err(RouterError::RegistryParse { .. })
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let triggers = dir.path().join("registry").join("skill-triggers.json");
        fs::create_dir_all(triggers.parent().unwrap()).unwrap();
        fs::write(
            &triggers,
            r#"{"skills": [
                {"name": "pdf", "triggers": ["extract pdf"], "description": "PDF tools"}
            ]}"#,
        )
        .unwrap();

        let index = build_index_from_file(&triggers).unwrap();
        let index_path = dir.path().join("cache").join("keyword-index.json");
        save_index(&index, &index_path).unwrap();

        let loaded = load_index(&index_path, Some(&triggers)).unwrap();
        assert_eq!(loaded.keywords, index.keywords);
        assert_eq!(loaded.skills, index.skills);
        assert!((loaded.triggers_mtime - index.triggers_mtime).abs() < 1e-3);
    }

    #[test]
    fn test_stale_index_rejected() {
        let dir = TempDir::new().unwrap();
        let triggers = dir.path().join("skill-triggers.json");
        fs::write(&triggers, r#"{"skills": []}"#).unwrap();
        let live = file_mtime(&triggers).unwrap();

        let mut index = build_index(&[skill("pdf", "", &["pdf"])]).unwrap();
        index.triggers_mtime = live - 2.0;
        let index_path = dir.path().join("keyword-index.json");
        save_index(&index, &index_path).unwrap();

        assert!(matches!(
            load_index(&index_path, Some(&triggers)),
            Err(RouterError::StaleIndex { .. })
        ));

        // Within the one-second tolerance
        index.triggers_mtime = live - 0.5;
        save_index(&index, &index_path).unwrap();
        assert!(load_index(&index_path, Some(&triggers)).is_ok());
    }

    #[test]
    fn test_missing_index() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            load_index(&missing, None),
            Err(RouterError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_find_triggers_file() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        fs::write(&b, "{}").unwrap();
        assert_eq!(find_triggers_file(&[a.clone(), b.clone()]).unwrap(), b);
        assert!(matches!(
            find_triggers_file(&[a]),
            Err(RouterError::TriggersNotFound(_))
        ));
    }
}
