//! Terminal rendering for routing analyses and stats reports.
//!
//! Everything returns a `String` so callers choose the stream. Hook mode
//! disables colors before rendering; the interactive commands keep them.

use colored::Colorize;
use std::fmt::{self, Write};

use crate::explain::Explanation;
use crate::router::{confidence_percent, RoutingResult};
use crate::stats::RoutingStats;

/// Top score for a direct instruction to use the skill
pub const STRONG_MATCH_SCORE: f64 = 1.0;

/// Top score for a softer suggestion
pub const SUGGESTED_SCORE: f64 = 0.5;

/// Rows in the verbose ranking table
pub const RANKING_ROWS: usize = 10;

const WIDTH: usize = 70;

fn rule(ch: char, width: usize) -> String {
    ch.to_string().repeat(width)
}

/// Run a writer against a fresh buffer. Writing to a `String` only fails
/// if a `Display` impl does, in which case nothing is rendered.
fn render<F>(write: F) -> String
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    let mut out = String::new();
    write(&mut out).map(|()| out).unwrap_or_default()
}

/// One-line outcome for stderr, e.g. `[routing: office-pdf 140% (2.1ms)]`
pub fn routing_summary(result: &RoutingResult) -> String {
    if let Some(reason) = result.skip_reason {
        return format!("[routing: {}]", reason.as_str());
    }
    match result.top() {
        Some(top) => format!(
            "[routing: {} {}% ({:.1}ms)]",
            top.name,
            (top.score * 100.0).round() as i64,
            result.elapsed_ms
        ),
        None => format!("[routing: no match ({:.1}ms)]", result.elapsed_ms),
    }
}

/// Full analysis block. Empty when nothing matched.
pub fn routing_analysis(
    result: &RoutingResult,
    explanation: &Explanation,
    verbose: bool,
    min_score: f64,
    near_miss_floor: f64,
) -> String {
    if result.matches.is_empty() {
        return String::new();
    }
    render(|out| {
        write_analysis(out, result, explanation)?;
        if verbose {
            write_ranking(out, result, min_score, near_miss_floor)?;
        }
        writeln!(out, "\n⚡ Performance: {:.1}ms", result.elapsed_ms)?;
        writeln!(out, "{}", rule('=', WIDTH))
    })
}

fn write_analysis(
    out: &mut String,
    result: &RoutingResult,
    explanation: &Explanation,
) -> fmt::Result {
    let Some(top) = result.top() else {
        return Ok(());
    };

    writeln!(out, "\n{}", rule('=', WIDTH))?;
    writeln!(out, "{}", "🔍 SKILL ROUTING ANALYSIS".bold())?;
    writeln!(out, "{}", rule('=', WIDTH))?;

    if explanation.auto_activated {
        writeln!(out, "\n{}", "🎯 AUTO-ACTIVATION (Context Detection):".bold())?;
        writeln!(out, "{}", rule('─', 60))?;
        if let Some(reason) = &explanation.auto_reason {
            writeln!(out, "  ✅ {}", reason)?;
        }
        writeln!(out, "  🔧 Auto-activated: {}", top.name.green().bold())?;
        writeln!(out, "{}", rule('─', 60))?;
    }

    if let Some(summary) = &explanation.context_summary {
        writeln!(out, "\n📂 Context Detected:")?;
        writeln!(out, "   Working directory contains: {}", summary)?;
    }

    if !explanation.hints.is_empty() {
        writeln!(out, "\n💡 Related to this directory:")?;
        for hint in &explanation.hints {
            writeln!(out, "   • {}", hint.cyan())?;
        }
    }

    let enhancements = explanation.enhancements();
    if !enhancements.is_empty() {
        writeln!(out, "\n✨ Query Enhancements:")?;
        for line in enhancements {
            writeln!(out, "   • {}", line)?;
        }
    }

    if explanation.auto_activated {
        return Ok(());
    }

    let confidence = top.confidence();
    writeln!(out, "\n🎯 Routing Result:")?;
    if top.score >= STRONG_MATCH_SCORE {
        let label = "STRONG MATCH".green().bold();
        writeln!(out, "   ✅ {} ({}% confidence)", label, confidence)?;
        writeln!(out, "   → Use Skill(\"{}\")", top.name.bold())?;
    } else if top.score >= SUGGESTED_SCORE {
        let label = "SUGGESTED".yellow().bold();
        writeln!(out, "   💡 {} ({}% confidence)", label, confidence)?;
        writeln!(out, "   → Skill(\"{}\") might help", top.name.bold())?;
    } else {
        writeln!(out, "   📋 {} (low confidence)", "RELATED SKILLS".dimmed())?;
        for m in result.matches.iter().take(3) {
            writeln!(out, "   • {} ({}%)", m.name, m.confidence())?;
        }
    }
    if top.score >= SUGGESTED_SCORE {
        if let Some(reasoning) = &explanation.reasoning {
            writeln!(out, "   📝 Why: {}", reasoning)?;
        }
    }
    Ok(())
}

/// Top-10 scores with threshold markers and a confidence bar
pub fn ranking_table(result: &RoutingResult, min_score: f64, near_miss_floor: f64) -> String {
    render(|out| write_ranking(out, result, min_score, near_miss_floor))
}

fn write_ranking(
    out: &mut String,
    result: &RoutingResult,
    min_score: f64,
    near_miss_floor: f64,
) -> fmt::Result {
    writeln!(out, "\n📊 Top {} Skills Ranking:", RANKING_ROWS)?;
    writeln!(out, "{}", rule('─', WIDTH))?;

    for (i, (skill, score)) in result.ranked_scores(RANKING_ROWS).into_iter().enumerate() {
        let confidence = confidence_percent(score);
        let bar = "█".repeat((confidence / 5) as usize);
        let status = if score >= min_score {
            "✓".green()
        } else if score >= near_miss_floor {
            "~".yellow()
        } else {
            "✗".red()
        };
        writeln!(
            out,
            "  {} {:>2}. {:<40} {} {}%",
            status,
            i + 1,
            skill,
            bar,
            confidence
        )?;
    }

    writeln!(out, "{}", rule('─', WIDTH))?;
    writeln!(
        out,
        "  ✓ Above threshold (≥{:.2}) | ~ Near-miss ({:.2}-{:.2}) | ✗ Below threshold",
        min_score,
        near_miss_floor,
        min_score - 0.01
    )
}

/// Multi-section performance report
pub fn stats_report(stats: &RoutingStats) -> String {
    render(|out| write_report(out, stats))
}

fn write_report(out: &mut String, stats: &RoutingStats) -> fmt::Result {
    let history = &stats.history;
    let near = &stats.near_misses;

    writeln!(out, "\n{}", rule('=', WIDTH))?;
    writeln!(out, "{:^width$}", "ROUTING PERFORMANCE REPORT", width = WIDTH)?;
    writeln!(out, "{}", rule('=', WIDTH))?;

    let no_match_rate = if history.total > 0 {
        100.0 - history.match_rate
    } else {
        0.0
    };
    writeln!(out, "\n{}\n", "## OVERALL STATS".bold())?;
    writeln!(out, "Total routings:      {}", history.total)?;
    writeln!(
        out,
        "Match rate:          {:.1}% ({} matches)",
        history.match_rate, history.matches
    )?;
    writeln!(
        out,
        "No match:            {:.1}% ({} prompts)",
        no_match_rate, history.no_match
    )?;
    writeln!(out, "High confidence:     {} (>= 50%)", history.high_confidence)?;
    writeln!(out, "Low confidence:      {} (< 50%)", history.low_confidence)?;
    writeln!(out, "Avg confidence:      {:.1}%", history.avg_confidence)?;
    writeln!(out, "Avg response time:   {:.1}ms", history.avg_time)?;

    writeln!(out, "\n{}\n", "## TOP MATCHED SKILLS".bold())?;
    let top = history.top_skills(15);
    if top.is_empty() {
        writeln!(out, "  (no matches recorded)")?;
    }
    for (skill, count) in top {
        let share = count as f64 / history.matches.max(1) as f64 * 100.0;
        writeln!(out, "  {:>4}x  {:<45} ({:.1}%)", count, skill, share)?;
    }

    writeln!(out, "\n{}\n", "## NEAR-MISSES (Trigger Gaps)".bold())?;
    writeln!(out, "Skills that almost matched, they need better triggers:\n")?;
    let misses = near.top_skills(15);
    if misses.is_empty() {
        writeln!(out, "  (no near-misses recorded)")?;
    }
    for (skill, count) in misses {
        let gap = near.avg_gap.get(skill).copied().unwrap_or(0.0);
        writeln!(out, "  {:>4}x  {:<45} (avg gap: {:.0}%)", count, skill, gap)?;
    }

    writeln!(out, "\n{}\n", "## DAILY TREND (last 7 days)".bold())?;
    let days = history.recent_days(7);
    if days.is_empty() {
        writeln!(out, "  (no daily data)")?;
    } else {
        writeln!(out, "  Date         Matches   No Match   Rate")?;
        writeln!(out, "  {}", rule('-', 50))?;
        for (day, data) in days {
            writeln!(
                out,
                "  {}   {:>7}   {:>8}   {:.1}%",
                day,
                data.matches,
                data.no_match,
                data.match_rate()
            )?;
        }
    }

    writeln!(out, "\n{}\n", "## RECOMMENDATIONS".bold())?;
    let advice = stats.recommendations();
    if advice.is_empty() {
        writeln!(out, "  {}", "No issues detected".green())?;
    }
    for line in advice {
        writeln!(out, "  {} {}", "[!]".yellow().bold(), line)?;
    }

    writeln!(out, "\n{}", rule('=', WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RoutingContext;
    use crate::explain::explain;
    use crate::router::{RankedMatch, SkipReason};
    use crate::stats::{analyze_history, analyze_near_misses};
    use std::collections::BTreeMap;
    use std::path::Path;

    fn result(scores: &[(&str, f64)]) -> RoutingResult {
        let matches = scores
            .iter()
            .filter(|(_, s)| *s >= 0.25)
            .take(2)
            .map(|(n, s)| RankedMatch {
                name: n.to_string(),
                description: String::new(),
                source: "global".to_string(),
                score: *s,
                evidence: vec![format!("phrase:{}", n)],
            })
            .collect();
        RoutingResult {
            matches,
            all_scores: scores.iter().map(|(n, s)| (n.to_string(), *s)).collect::<BTreeMap<_, _>>(),
            auto_activated: false,
            auto_reason: None,
            context: RoutingContext::empty(Path::new("/work")),
            skip_reason: None,
            elapsed_ms: 2.34,
        }
    }

    #[test]
    fn test_summary_lines() {
        let r = result(&[("office-pdf", 1.4)]);
        assert_eq!(routing_summary(&r), "[routing: office-pdf 140% (2.3ms)]");

        let r = result(&[("office-pdf", 0.2)]);
        assert_eq!(routing_summary(&r), "[routing: no match (2.3ms)]");

        let empty = RoutingContext::empty(Path::new("/"));
        let r = RoutingResult::skipped(empty, SkipReason::PromptTooShort);
        assert_eq!(routing_summary(&r), "[routing: prompt too short]");
    }

    #[test]
    fn test_analysis_tiers() {
        let strong = result(&[("office-pdf", 1.4)]);
        let out = routing_analysis(&strong, &explain("merge pdf", &strong), false, 0.25, 0.10);
        assert!(out.contains("STRONG MATCH"));
        assert!(out.contains("(28% confidence)"));
        assert!(out.contains("office-pdf"));
        assert!(out.contains("📝 Why: Explicit keyword match"));

        let suggested = result(&[("office-pdf", 0.6)]);
        let out = routing_analysis(&suggested, &explain("pdf", &suggested), false, 0.25, 0.10);
        assert!(out.contains("SUGGESTED"));
        assert!(out.contains("might help"));

        let related = result(&[("office-pdf", 0.3), ("office-docx", 0.26)]);
        let out = routing_analysis(&related, &explain("doc", &related), false, 0.25, 0.10);
        assert!(out.contains("RELATED SKILLS"));
        assert!(out.contains("• office-docx (5%)"));
        assert!(!out.contains("Why:"));
    }

    #[test]
    fn test_no_match_renders_nothing() {
        let r = result(&[("office-pdf", 0.1)]);
        assert!(routing_analysis(&r, &explain("x", &r), true, 0.25, 0.10).is_empty());
    }

    #[test]
    fn test_ranking_table_order_and_markers() {
        let r = result(&[("b-skill", 0.5), ("a-skill", 0.5), ("near", 0.2), ("far", 0.05)]);
        let table = ranking_table(&r, 0.25, 0.10);
        let a = table.find("a-skill").unwrap();
        let b = table.find("b-skill").unwrap();
        let near = table.find("near").unwrap();
        assert!(a < b && b < near);
        // 0.5 → 10% confidence → two blocks
        assert!(table.contains(" ██ 10%"));
        assert!(table.contains("Near-miss (0.10-0.24)"));
    }

    #[test]
    fn test_stats_report_sections() {
        let stats = RoutingStats {
            history: analyze_history(&[]),
            near_misses: analyze_near_misses(&[]),
        };
        let report = stats_report(&stats);
        assert!(report.contains("ROUTING PERFORMANCE REPORT"));
        assert!(report.contains("(no matches recorded)"));
        assert!(report.contains("(no near-misses recorded)"));
        assert!(report.contains("(no daily data)"));
        assert!(report.contains("Match rate is very low"));
    }
}
