//! The analysis pipeline: walk a source tree, analyze files in parallel,
//! then build the semantic context behind a synchronization barrier.
//!
//! Per-file parse failures never abort the batch; they are recorded on the
//! failing file's analysis. The aggregate parse-error ratio is surfaced as
//! a warning-level outcome and the caller decides whether to proceed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::{
    dep_graph::SemanticContext,
    parser::{SourceLanguage, parse_source},
    resolver::ImportResolver,
    semantic::{FileAnalysis, analyze_file},
};

/// Extensions the analyzer considers source files
const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "mts", "cts"];

/// Directories never worth analyzing
const EXCLUDED_DIRS: &[&str] = &["node_modules", "dist", "build", "coverage", "out"];

#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    /// Parse-error ratio above which the outcome carries a warning
    pub max_parse_error_ratio: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_parse_error_ratio: 0.25,
        }
    }
}

/// Result of a directory-wide analysis run
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub context: SemanticContext,
    /// Ratio of files with at least one parse error
    pub parse_error_ratio: f64,
    /// Non-fatal findings the caller should weigh before planning edits
    pub warnings: Vec<String>,
}

/// Analyze every source file under `root` and build a [`SemanticContext`].
///
/// Stage 1 (parallel): parse + per-file analysis over disjoint files.
/// Stage 2 (barrier): graph and symbol-index construction, which needs all
/// per-file results at once.
pub fn analyze_tree(root: &Path, options: &AnalysisOptions) -> Result<AnalysisOutcome> {
    let files = collect_source_files(root)?;
    info!(
        "analyzing {} source files under {}",
        files.len(),
        root.display()
    );

    let resolver = ImportResolver::new(root);
    let analyses: Vec<FileAnalysis> = files
        .par_iter()
        .map(|relative| analyze_one(root, relative, &resolver))
        .collect();

    let failed = analyses.iter().filter(|a| a.has_parse_errors()).count();
    let parse_error_ratio = if analyses.is_empty() {
        0.0
    } else {
        failed as f64 / analyses.len() as f64
    };

    debug!("building dependency graph from {} analyses", analyses.len());
    let context = SemanticContext::from_analyses(analyses);

    let mut warnings = Vec::new();
    if parse_error_ratio > options.max_parse_error_ratio {
        let message = format!(
            "parse-error ratio {parse_error_ratio:.2} exceeds threshold {:.2} ({failed} files); \
             the tree may not be safely plannable",
            options.max_parse_error_ratio
        );
        warn!("{message}");
        warnings.push(message);
    }
    for conflict in context.symbol_conflicts() {
        warnings.push(format!(
            "duplicate export '{}': kept {}, shadowed {}",
            conflict.name,
            conflict.kept.display(),
            conflict.shadowed.display()
        ));
    }

    Ok(AnalysisOutcome {
        context,
        parse_error_ratio,
        warnings,
    })
}

fn analyze_one(root: &Path, relative: &Path, resolver: &ImportResolver) -> FileAnalysis {
    let absolute = root.join(relative);
    let source = match std::fs::read_to_string(&absolute) {
        Ok(source) => source,
        Err(e) => {
            return FileAnalysis::parse_failed(
                relative.to_path_buf(),
                format!("cannot read file: {e}"),
            );
        }
    };
    match parse_source(&source, SourceLanguage::from_path(relative)) {
        Ok(tree) => analyze_file(&tree, relative, resolver),
        Err(failure) => FileAnalysis::parse_failed(relative.to_path_buf(), failure.to_string()),
    }
}

/// Collect workspace-relative source paths under `root`, skipping build
/// output, vendored dependencies and dot-directories.
pub fn collect_source_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && !EXCLUDED_DIRS.contains(&name.as_ref())
        });
    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let has_source_ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
        if !has_source_ext {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(relative);
    }
    files.sort();
    Ok(files)
}
