//! Working-directory context detection.
//!
//! Only the immediate children of the working directory are inspected. Rules
//! are evaluated in priority order and the first auto-activation wins:
//! path substrings, exact file names, folder names, then the AutoHotkey
//! dialect heuristic and the documentation-heavy heuristic. Hints never
//! auto-activate. Any filesystem failure yields an empty context.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{AutoActivatePolicy, Thresholds};

/// Directories with more entries than this are not scanned at all
const MAX_DIR_ENTRIES: usize = 200;

/// Only this many entries (sorted by name) are inspected
const MAX_SCANNED_ENTRIES: usize = 50;

/// Bytes read from a script file for dialect detection
const DIALECT_SAMPLE_BYTES: u64 = 2048;

/// How long a scan result is reused for the same directory
pub const CONTEXT_CACHE_TTL: Duration = Duration::from_secs(30);

lazy_static! {
    static ref RE_TEST_FILE: Regex =
        Regex::new(r"^(test_.+|.+_test\.\w+|.+\.(test|spec)\.\w+)$").unwrap();

    // AutoHotkey v2 syntax
    static ref AHK_V2_PATTERNS: Vec<Regex> = [
        r"(?im)^#Requires\s+AutoHotkey\s+v?2",
        r"\bglobal\s+\w+\s*:=",
        r"\bclass\s+\w+\s*\{",
        r"\(\)\s*=>",
        r"\.Push\(",
        r"\.Length\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    // AutoHotkey v1 syntax
    static ref AHK_V1_PATTERNS: Vec<Regex> = [
        r"(?m)^#NoEnv\b",
        r"\bSetBatchLines\b",
        r":=\s*Object\(\)",
        r"\bIfEqual\b",
        r"\bStringReplace\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

// ============================================================================
// Context Rules
// ============================================================================

/// Script dialect disambiguation: an extension shared by two language
/// versions plus extensions that only the newer version uses.
#[derive(Debug, Clone, PartialEq)]
pub struct DialectRule {
    pub label: String,
    pub ambiguous_ext: String,
    pub new_only_exts: Vec<String>,
    pub old_skill: String,
    pub new_skill: String,
}

/// Which skills directory evidence points to
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRules {
    /// Tier 0: substring of the lowercased cwd → skill
    pub path_substrings: Vec<(String, String)>,
    /// Tier 1: lowercase top-level file name → skill
    pub files: HashMap<String, String>,
    /// Tier 1: lowercase top-level folder name → skill
    pub folders: HashMap<String, String>,
    /// Tier 3: file or folder name → suggested skills
    pub hints: HashMap<String, Vec<String>>,
    /// Extension (with dot) → skills boosted when enough files are present
    pub extension_skills: BTreeMap<String, Vec<String>>,
    pub dialect: DialectRule,
    /// Skill boosted by a volume of test files
    pub test_skill: String,
    /// Skill for documentation-heavy projects
    pub documentation_skill: String,
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn owned_lists(pairs: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
    pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

impl Default for ContextRules {
    fn default() -> Self {
        const XLSX: &[&str] = &["anthropic-office-xlsx"];
        const DOCX: &[&str] = &["anthropic-office-docx"];
        const PPTX: &[&str] = &["anthropic-office-pptx"];
        const BATCH: &[&str] = &["julien-ref-batch"];
        const SUBTITLES: &[&str] = &["subtitle-translation"];
        const COMMIT: &[&str] = &["julien-dev-commit-message"];
        const FRONTEND: &[&str] = &["anthropic-web-frontend-design"];
        const PDF: &[&str] = &["anthropic-office-pdf"];
        const AHK: &[&str] = &["julien-ref-ahk-v2", "julien-ref-ahk-v1"];
        const AHK2: &[&str] = &["julien-ref-ahk-v2"];
        const POWERSHELL: &[&str] = &["julien-ref-powershell"];
        const MARKDOWN: &[&str] = &["julien-ref-notion-markdown"];

        Self {
            path_substrings: owned_pairs(&[
                ("srv759970", "julien-infra-hostinger-ssh"),
                ("hostinger", "julien-infra-hostinger-ssh"),
            ]),
            files: owned_pairs(&[
                ("astro.config.mjs", "julien-ref-astro-install"),
                ("astro.config.ts", "julien-ref-astro-install"),
                ("theme.json", "julien-wordpress-structure-validator"),
                ("mcp_server.py", "anthropic-dev-tools-mcp-builder"),
                ("docker-compose.yml", "julien-infra-hostinger-docker"),
                ("docker-compose.yaml", "julien-infra-hostinger-docker"),
            ])
            .into_iter()
            .collect(),
            folders: owned_pairs(&[
                ("wp-content", "julien-wordpress-structure-validator"),
                ("wp-admin", "julien-wordpress-structure-validator"),
                ("wp-includes", "julien-wordpress-structure-validator"),
            ])
            .into_iter()
            .collect(),
            hints: owned_lists(&[
                (".git", COMMIT),
                (".github", COMMIT),
                ("package.json", FRONTEND),
                ("tsconfig.json", FRONTEND),
            ])
            .into_iter()
            .collect(),
            extension_skills: owned_lists(&[
                (".pdf", PDF),
                (".docx", DOCX),
                (".doc", DOCX),
                (".xlsx", XLSX),
                (".xls", XLSX),
                (".xlsm", XLSX),
                (".csv", XLSX),
                (".tsv", XLSX),
                (".pptx", PPTX),
                (".ppt", PPTX),
                (".ahk", AHK),
                (".ahk2", AHK2),
                (".ah2", AHK2),
                (".ps1", POWERSHELL),
                (".bat", BATCH),
                (".cmd", BATCH),
                (".srt", SUBTITLES),
                (".vtt", SUBTITLES),
                // Documentation projects are boosted by `documentation_skill`
                // from `min_markdown_files` up, not by the extension alone
                (".md", MARKDOWN),
            ])
            .into_iter()
            .collect(),
            dialect: DialectRule {
                label: "AutoHotkey".to_string(),
                ambiguous_ext: ".ahk".to_string(),
                new_only_exts: vec![".ahk2".to_string(), ".ah2".to_string()],
                old_skill: "julien-ref-ahk-v1".to_string(),
                new_skill: "julien-ref-ahk-v2".to_string(),
            },
            test_skill: "julien-dev-test-runner".to_string(),
            documentation_skill: "julien-ref-doc-production".to_string(),
        }
    }
}

// ============================================================================
// Routing Context
// ============================================================================

/// What the working directory says about the user's likely intent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingContext {
    pub cwd: PathBuf,
    /// Extension (with dot, lowercase) → file count
    pub extensions: BTreeMap<String, usize>,
    pub files: BTreeSet<String>,
    pub folders: BTreeSet<String>,
    pub auto_activate: Option<String>,
    pub auto_activate_reason: Option<String>,
    pub hints: Vec<String>,
    pub test_files_count: usize,
    pub md_files_count: usize,
}

impl RoutingContext {
    pub fn empty(cwd: &Path) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn extension_count(&self, ext: &str) -> usize {
        self.extensions.get(ext).copied().unwrap_or(0)
    }

    fn activate(&mut self, skill: &str, reason: String) {
        if self.auto_activate.is_none() {
            self.auto_activate = Some(skill.to_string());
            self.auto_activate_reason = Some(reason);
        }
    }

    fn add_hints(&mut self, skills: &[String]) {
        for skill in skills {
            if !self.hints.contains(skill) {
                self.hints.push(skill.clone());
            }
        }
    }
}

// ============================================================================
// Scanning
// ============================================================================

/// Which dialect a script sample is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Old,
    New,
}

/// Score a script sample against the v1/v2 syntax patterns; `None` on a tie
pub fn detect_dialect(sample: &str) -> Option<Dialect> {
    let new_hits = AHK_V2_PATTERNS.iter().filter(|p| p.is_match(sample)).count();
    let old_hits = AHK_V1_PATTERNS.iter().filter(|p| p.is_match(sample)).count();
    debug!("Dialect hits: new={} old={}", new_hits, old_hits);

    match new_hits.cmp(&old_hits) {
        std::cmp::Ordering::Greater => Some(Dialect::New),
        std::cmp::Ordering::Less => Some(Dialect::Old),
        std::cmp::Ordering::Equal => None,
    }
}

fn read_sample(path: &Path) -> io::Result<String> {
    let mut buf = Vec::new();
    File::open(path)?
        .take(DIALECT_SAMPLE_BYTES)
        .read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn is_test_file(name: &str) -> bool {
    RE_TEST_FILE.is_match(name)
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

/// Scan `cwd` once, without caching. Never fails.
pub fn scan_directory(
    cwd: &Path,
    rules: &ContextRules,
    policy: &AutoActivatePolicy,
    thresholds: &Thresholds,
) -> RoutingContext {
    match try_scan(cwd, rules, policy, thresholds) {
        Ok(context) => context,
        Err(e) => {
            debug!("Context scan of {} failed: {}", cwd.display(), e);
            RoutingContext::empty(cwd)
        }
    }
}

fn try_scan(
    cwd: &Path,
    rules: &ContextRules,
    policy: &AutoActivatePolicy,
    thresholds: &Thresholds,
) -> io::Result<RoutingContext> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(cwd)?.filter_map(|e| e.ok()).collect();
    if entries.len() > MAX_DIR_ENTRIES {
        debug!("{} has {} entries, skipping scan", cwd.display(), entries.len());
        return Ok(RoutingContext::empty(cwd));
    }
    entries.sort_by_key(|e| e.file_name());

    let mut context = RoutingContext::empty(cwd);

    // Tier 0: path substring
    if policy.path_rules {
        let path_lower = cwd.to_string_lossy().to_lowercase();
        if let Some((needle, skill)) = rules
            .path_substrings
            .iter()
            .find(|(needle, _)| path_lower.contains(needle.as_str()))
        {
            context.activate(skill, format!("Path contains: {}", needle));
        }
    }

    let mut first_ambiguous: Option<PathBuf> = None;
    // (original, lowercase) names in scan order
    let mut file_names: Vec<(String, String)> = Vec::new();
    let mut folder_names: Vec<(String, String)> = Vec::new();

    for entry in entries.iter().take(MAX_SCANNED_ENTRIES) {
        let original = entry.file_name().to_string_lossy().into_owned();
        let name = original.to_lowercase();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_file() {
            if let Some(ext) = extension_of(&name) {
                if ext == rules.dialect.ambiguous_ext && first_ambiguous.is_none() {
                    first_ambiguous = Some(entry.path());
                }
                *context.extensions.entry(ext).or_insert(0) += 1;
            }
            if is_test_file(&name) {
                context.test_files_count += 1;
            }
            if let Some(skills) = rules.hints.get(&name) {
                context.add_hints(skills);
            }
            context.files.insert(name.clone());
            file_names.push((original, name));
        } else if file_type.is_dir() {
            if let Some(skills) = rules.hints.get(&name) {
                context.add_hints(skills);
            }
            context.folders.insert(name.clone());
            folder_names.push((original, name));
        }
    }

    // Tier 1: every exact file name before any folder name
    if policy.file_rules {
        for (original, name) in &file_names {
            if let Some(skill) = rules.files.get(name) {
                context.activate(skill, format!("File detected: {}", original));
            }
        }
    }
    if policy.folder_rules {
        for (original, name) in &folder_names {
            if let Some(skill) = rules.folders.get(name) {
                context.activate(skill, format!("Folder detected: {}/", original));
            }
        }
    }

    context.md_files_count = context.extension_count(".md");

    if context.auto_activate.is_none() && policy.dialect_detection {
        apply_dialect_rule(&mut context, rules, thresholds, first_ambiguous.as_deref());
    }

    if context.auto_activate.is_none()
        && policy.documentation_heavy
        && context.md_files_count >= thresholds.min_markdown_files
    {
        let reason = format!("Documentation project ({} .md files)", context.md_files_count);
        context.activate(&rules.documentation_skill, reason);
    }

    Ok(context)
}

fn apply_dialect_rule(
    context: &mut RoutingContext,
    rules: &ContextRules,
    thresholds: &Thresholds,
    first_ambiguous: Option<&Path>,
) {
    let dialect = &rules.dialect;
    let new_only: usize = dialect
        .new_only_exts
        .iter()
        .map(|ext| context.extension_count(ext))
        .sum();
    let ambiguous = context.extension_count(&dialect.ambiguous_ext);

    if new_only >= thresholds.min_files_for_boost {
        let reason = format!(
            "{} new-dialect project ({} {} files)",
            dialect.label,
            new_only,
            dialect.new_only_exts.join("/")
        );
        context.activate(&dialect.new_skill, reason);
        return;
    }

    if ambiguous < thresholds.min_files_for_boost {
        return;
    }

    let sample = match first_ambiguous.map(read_sample) {
        Some(Ok(sample)) => sample,
        Some(Err(e)) => {
            debug!("Could not read dialect sample: {}", e);
            return;
        }
        None => return,
    };

    let (skill, label) = match detect_dialect(&sample) {
        Some(Dialect::New) => (&dialect.new_skill, "new"),
        Some(Dialect::Old) => (&dialect.old_skill, "old"),
        None => return,
    };
    let reason = format!(
        "{} {} syntax detected ({} {} files)",
        dialect.label, label, ambiguous, dialect.ambiguous_ext
    );
    context.activate(skill, reason);
}

/// Directory scanner that reuses its last result for the same directory
/// within `ttl`.
#[derive(Debug)]
pub struct ContextScanner {
    rules: ContextRules,
    policy: AutoActivatePolicy,
    thresholds: Thresholds,
    enabled: bool,
    ttl: Duration,
    cache: Option<CachedScan>,
}

#[derive(Debug)]
struct CachedScan {
    cwd: PathBuf,
    at: Instant,
    context: RoutingContext,
}

impl ContextScanner {
    pub fn new(
        rules: ContextRules,
        policy: AutoActivatePolicy,
        thresholds: Thresholds,
        enabled: bool,
    ) -> Self {
        Self {
            rules,
            policy,
            thresholds,
            enabled,
            ttl: CONTEXT_CACHE_TTL,
            cache: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn scan(&mut self, cwd: &Path) -> RoutingContext {
        if !self.enabled {
            return RoutingContext::empty(cwd);
        }

        if let Some(cached) = &self.cache {
            if cached.cwd == cwd && cached.at.elapsed() < self.ttl {
                debug!("Context cache hit for {}", cwd.display());
                return cached.context.clone();
            }
        }

        let context = scan_directory(cwd, &self.rules, &self.policy, &self.thresholds);
        self.cache = Some(CachedScan {
            cwd: cwd.to_path_buf(),
            at: Instant::now(),
            context: context.clone(),
        });
        context
    }
}
