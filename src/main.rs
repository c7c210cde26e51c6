//! `fsr` - Fast Skill Router binary
//!
//! Without a subcommand it runs as the `UserPromptSubmit` hook: JSON payload
//! on stdin, routing analysis on stdout, `[routing: ...]` on stderr. The hook
//! always exits 0 so a routing problem never blocks the prompt.

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};

use fast_skill_router::config::{claude_home, RouterConfig, RouterPaths};
use fast_skill_router::explain::explain;
use fast_skill_router::hook::HookInput;
use fast_skill_router::index::{build_index_from_file, find_triggers_file, save_index};
use fast_skill_router::logger::RoutingLogger;
use fast_skill_router::render::{routing_analysis, routing_summary, stats_report};
use fast_skill_router::router::{Router, RoutingResult};
use fast_skill_router::stats::RoutingStats;
use fast_skill_router::Result;

#[derive(Parser)]
#[command(name = "fsr")]
#[command(about = "Route prompts to skills through a prebuilt keyword index", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Route one prompt and print the analysis
    Route {
        prompt: String,

        /// Directory to scan for context (defaults to the current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Print the routing result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the keyword index from the trigger registry
    #[command(name = "build-index")]
    BuildIndex {
        /// Trigger registry (defaults to the first skill-triggers.json found)
        #[arg(long)]
        triggers: Option<PathBuf>,

        /// Output path (defaults to ~/.claude/cache/keyword-index.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Summarise the routing history and near-miss logs
    Stats {
        #[arg(long, conflicts_with = "summary")]
        json: bool,

        /// One-line summary
        #[arg(long)]
        summary: bool,
    },
}

fn main() -> ExitCode {
    // Initialize tracing if RUST_LOG is set
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        None => {
            if let Err(e) = run_hook() {
                error!("Error: {}", e);
            }
            // Exit 0 to not block the prompt
            return ExitCode::SUCCESS;
        }
        Some(Command::Route { prompt, cwd, json }) => run_route(&prompt, cwd, json),
        Some(Command::BuildIndex { triggers, output }) => run_build_index(triggers, output),
        Some(Command::Stats { json, summary }) => run_stats(json, summary),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run_hook() -> Result<()> {
    let input = HookInput::from_reader(io::stdin().lock())?;
    let config = RouterConfig::from_env()?;
    let cwd = input.resolve_cwd();
    debug!("Routing from {}", cwd.display());

    let mut router = Router::new(config);
    let result = router.route_prompt(&input.prompt, &cwd);
    if result.skip_reason.is_none() {
        RoutingLogger::new(router.config()).record(&input.prompt, &result);
    }

    // Hook stdout is read as plain text
    colored::control::set_override(false);
    print_analysis(&router, &input.prompt, &result);
    eprintln!("{}", routing_summary(&result));
    Ok(())
}

fn run_route(prompt: &str, cwd: Option<PathBuf>, as_json: bool) -> Result<()> {
    let config = RouterConfig::from_env()?;
    let cwd = match cwd {
        Some(dir) => dir,
        None => HookInput::default().resolve_cwd(),
    };

    let mut router = Router::new(config);
    let result = router.route_prompt(prompt, &cwd);

    if as_json {
        let output = json!({
            "result": result,
            "explanation": explain(prompt, &result),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if result.matches.is_empty() {
        println!("{}", "No skill matched".dimmed());
    }
    print_analysis(&router, prompt, &result);
    eprintln!("{}", routing_summary(&result));
    Ok(())
}

fn print_analysis(router: &Router, prompt: &str, result: &RoutingResult) {
    let config = router.config();
    let analysis = routing_analysis(
        result,
        &explain(prompt, result),
        config.features.verbose_routing,
        config.thresholds.min_score,
        config.thresholds.near_miss_floor,
    );
    if !analysis.is_empty() {
        print!("{}", analysis);
    }
}

fn run_build_index(triggers: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let home = claude_home()?;
    let triggers = match triggers {
        Some(path) => path,
        None => find_triggers_file(&RouterPaths::trigger_candidates(&home))?,
    };
    let output = output.unwrap_or_else(|| RouterPaths::under(&home).index_file);

    info!("Building index from {}", triggers.display());
    let index = build_index_from_file(&triggers)?;
    save_index(&index, &output)?;

    println!(
        "{} {} keywords, {} skills → {}",
        "Index built:".green().bold(),
        index.keywords.len(),
        index.skills.len(),
        output.display()
    );
    Ok(())
}

fn run_stats(as_json: bool, summary: bool) -> Result<()> {
    let config = RouterConfig::from_env()?;
    let stats = RoutingStats::load(&config.paths.history_file, &config.paths.near_miss_file);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if summary {
        println!("{}", stats.summary_line());
    } else {
        print!("{}", stats_report(&stats));
    }
    Ok(())
}
