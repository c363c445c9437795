//! Thin CLI over the reflow library. The outer orchestrator loop (builds,
//! dev servers, commits) lives elsewhere; these commands only produce and
//! inspect the artifacts it consumes.

#![allow(clippy::print_stdout)]

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;

use reflow::{
    config::ZoneRules,
    constructs::{ConstructSource, extract_constructs},
    dep_graph::SemanticContext,
    parser::{SourceLanguage, parse_source},
    pipeline::{AnalysisOptions, analyze_tree},
    planner::{ChunkData, plan, unsatisfied_requirements},
    registry::{ConstructRegistry, content_hash},
    zones::{ConstructView, FpClassification, classify},
};

#[derive(Parser)]
#[command(name = "reflow", version, about = "Static analysis for safe JS/TS refactoring runs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a source tree and emit the semantic context artifact
    Analyze {
        /// Project root to analyze
        root: PathBuf,
        /// Write the JSON artifact here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Parse-error ratio above which a warning is emitted
        #[arg(long, default_value_t = 0.25)]
        max_error_ratio: f64,
    },
    /// Classify every construct in a source tree into purity zones
    Classify {
        root: PathBuf,
        /// Zone-rule TOML; built-in rules when omitted
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Scan constructs against the registry and report what needs work
    Status {
        root: PathBuf,
        /// Registry state directory
        #[arg(long, default_value = ".reflow")]
        state_dir: PathBuf,
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Order a set of edit chunks into an execution plan
    Plan {
        /// JSON file holding an array of chunks
        chunks: PathBuf,
        /// Optional analyzed root for symbol-feasibility warnings
        #[arg(long)]
        context_root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    match Cli::parse().command {
        Command::Analyze {
            root,
            output,
            max_error_ratio,
        } => run_analyze(&root, output.as_deref(), max_error_ratio),
        Command::Classify { root, rules } => run_classify(&root, rules.as_deref()),
        Command::Status {
            root,
            state_dir,
            rules,
        } => run_status(&root, &state_dir, rules.as_deref()),
        Command::Plan {
            chunks,
            context_root,
        } => run_plan(&chunks, context_root.as_deref()),
    }
}

fn run_analyze(root: &Path, output: Option<&Path>, max_error_ratio: f64) -> Result<()> {
    let options = AnalysisOptions {
        max_parse_error_ratio: max_error_ratio,
    };
    let outcome = analyze_tree(root, &options)?;
    for warning in &outcome.warnings {
        warn!("{warning}");
    }
    let json = serde_json::to_string_pretty(&outcome.context.export_document())?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("writing artifact to {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Re-parse each analyzed file and visit its constructs with their
/// classification. A file whose tree cannot be re-produced is skipped here;
/// its parse errors already sit on the analysis.
fn visit_constructs(
    root: &Path,
    context: &SemanticContext,
    rules: &ZoneRules,
    mut visit: impl FnMut(ConstructSource, FpClassification),
) {
    for (path, analysis) in context.files() {
        let Ok(source) = fs::read_to_string(root.join(path)) else {
            continue;
        };
        let Ok(tree) = parse_source(&source, SourceLanguage::from_path(path)) else {
            continue;
        };
        for construct in extract_constructs(&tree, path) {
            let view = ConstructView {
                name: &construct.identity.name,
                file_path: path,
                imports: &analysis.imports,
                leading_comment: construct.leading_comment.as_deref(),
                facts: &construct.facts,
            };
            let classification = classify(&view, rules);
            visit(construct, classification);
        }
    }
}

fn run_classify(root: &Path, rules_path: Option<&Path>) -> Result<()> {
    let rules = ZoneRules::load_or_default(rules_path)?;
    let outcome = analyze_tree(root, &AnalysisOptions::default())?;
    visit_constructs(root, &outcome.context, &rules, |construct, classification| {
        println!(
            "{:<60} {:<12} zone={:<16} purity={:<3} confidence={:.2}",
            construct.id,
            construct.identity.kind.to_string(),
            classification.zone.to_string(),
            classification.recommended_purity,
            classification.confidence
        );
    });
    Ok(())
}

fn run_status(root: &Path, state_dir: &Path, rules_path: Option<&Path>) -> Result<()> {
    let rules = ZoneRules::load_or_default(rules_path)?;
    let outcome = analyze_tree(root, &AnalysisOptions::default())?;
    let mut registry = ConstructRegistry::open(state_dir)?;

    let mut live_ids = HashSet::new();
    let mut needs_work = 0_usize;
    visit_constructs(root, &outcome.context, &rules, |construct, classification| {
        let anti_patterns = construct.facts.anti_pattern_findings();
        let hash = content_hash(&construct.text);
        let (process, reason) =
            registry.should_process(&construct.id, &hash, classification.zone, &anti_patterns);
        if process {
            needs_work += 1;
            println!("{:<60} NEEDS WORK  {reason}", construct.id);
        }
        live_ids.insert(construct.id);
    });

    let stale = registry.stale_entries(&live_ids);
    for id in &stale {
        println!("{id:<60} STALE       construct no longer present");
    }
    registry.save()?;
    println!(
        "\n{} tracked, {} need work, {} stale",
        registry.len(),
        needs_work,
        stale.len()
    );
    Ok(())
}

fn run_plan(chunks_path: &Path, context_root: Option<&Path>) -> Result<()> {
    let text = fs::read_to_string(chunks_path)
        .with_context(|| format!("reading chunks from {}", chunks_path.display()))?;
    let chunks: Vec<ChunkData> = serde_json::from_str(&text)
        .with_context(|| format!("parsing chunks from {}", chunks_path.display()))?;

    match plan(&chunks) {
        Ok(ordered) => {
            if let Some(root) = context_root {
                let outcome = analyze_tree(root, &AnalysisOptions::default())?;
                for warning in unsatisfied_requirements(&ordered, &outcome.context) {
                    warn!("{warning}");
                }
            }
            println!("{}", serde_json::to_string_pretty(&ordered)?);
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}
