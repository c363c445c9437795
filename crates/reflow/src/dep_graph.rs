//! Project-wide semantic context: the aggregate of all per-file analyses
//! plus forward/reverse dependency graphs and the exported-symbol index.
//!
//! A `SemanticContext` is an immutable value rebuilt from scratch on every
//! analysis run. Edges are held in a petgraph `DiGraph` pointing from
//! dependency to dependent, so topological traversal and dependent lookups
//! fall out of edge direction.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::warn;
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::semantic::FileAnalysis;

/// A duplicate exported symbol name. The first definition in sorted-path
/// order wins the index slot; every shadowed definition is recorded here.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolConflict {
    pub name: String,
    pub kept: PathBuf,
    pub shadowed: PathBuf,
}

/// Summary counts for the serialized artifact
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ContextSummary {
    pub total_files: usize,
    pub total_exports: usize,
    pub total_imports: usize,
    pub parse_error_count: usize,
}

/// The serialized artifact shape consumed by the authoring agent
#[derive(Debug, Serialize)]
pub struct ContextDocument {
    pub files: IndexMap<String, FileAnalysis>,
    pub dependency_graph: IndexMap<String, Vec<String>>,
    pub reverse_graph: IndexMap<String, Vec<String>>,
    pub symbol_index: IndexMap<String, String>,
    pub symbol_conflicts: Vec<SymbolConflict>,
    pub summary: ContextSummary,
}

#[derive(Debug)]
pub struct SemanticContext {
    files: IndexMap<PathBuf, FileAnalysis>,
    /// Edges point dependency -> dependent
    graph: DiGraph<PathBuf, ()>,
    node_indices: FxHashMap<PathBuf, NodeIndex>,
    symbol_index: IndexMap<String, PathBuf>,
    symbol_conflicts: Vec<SymbolConflict>,
}

impl SemanticContext {
    /// Build the context from per-file analyses.
    ///
    /// Analyses are sorted by path first so that node allocation, the symbol
    /// index and conflict resolution are deterministic regardless of the
    /// order the parallel analysis stage delivered them in.
    pub fn from_analyses(mut analyses: Vec<FileAnalysis>) -> Self {
        analyses.sort_by(|a, b| a.path.cmp(&b.path));

        let mut graph = DiGraph::new();
        let mut node_indices = FxHashMap::default();
        for analysis in &analyses {
            let idx = graph.add_node(analysis.path.clone());
            node_indices.insert(analysis.path.clone(), idx);
        }

        // Forward edges; dependencies resolving outside the analyzed set
        // (e.g. excluded directories) are dropped from the graph.
        for analysis in &analyses {
            let Some(&from_idx) = node_indices.get(&analysis.path) else {
                continue;
            };
            for dependency in &analysis.dependencies {
                if let Some(&dep_idx) = node_indices.get(dependency) {
                    if !graph.contains_edge(dep_idx, from_idx) {
                        graph.add_edge(dep_idx, from_idx, ());
                    }
                }
            }
        }

        // Derive dependents by transposition
        let mut files: IndexMap<PathBuf, FileAnalysis> = analyses
            .into_iter()
            .map(|a| (a.path.clone(), a))
            .collect();
        let mut reverse_edges: Vec<(PathBuf, PathBuf)> = Vec::new();
        for (path, analysis) in &files {
            for dependency in &analysis.dependencies {
                if files.contains_key(dependency) {
                    reverse_edges.push((dependency.clone(), path.clone()));
                }
            }
        }
        for (dependency, dependent) in reverse_edges {
            if let Some(analysis) = files.get_mut(&dependency) {
                analysis.dependents.insert(dependent);
            }
        }

        // Symbol index: first definition in sorted-path order wins
        let mut symbol_index: IndexMap<String, PathBuf> = IndexMap::new();
        let mut symbol_conflicts = Vec::new();
        for (path, analysis) in &files {
            for export in &analysis.exports {
                if export.name == "*" || export.name == "default" {
                    continue;
                }
                match symbol_index.get(&export.name) {
                    None => {
                        symbol_index.insert(export.name.clone(), path.clone());
                    }
                    Some(kept) if kept != path => {
                        warn!(
                            "symbol '{}' exported by both {} and {}; keeping the first",
                            export.name,
                            kept.display(),
                            path.display()
                        );
                        symbol_conflicts.push(SymbolConflict {
                            name: export.name.clone(),
                            kept: kept.clone(),
                            shadowed: path.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Self {
            files,
            graph,
            node_indices,
            symbol_index,
            symbol_conflicts,
        }
    }

    pub fn files(&self) -> &IndexMap<PathBuf, FileAnalysis> {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&FileAnalysis> {
        self.files.get(path)
    }

    /// Files this file imports (incoming edges, since edges point
    /// dependency -> dependent)
    pub fn dependencies_of(&self, path: &Path) -> Vec<&Path> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Files that import this file
    pub fn dependents_of(&self, path: &Path) -> Vec<&Path> {
        self.neighbors(path, Direction::Outgoing)
    }

    fn neighbors(&self, path: &Path, direction: Direction) -> Vec<&Path> {
        let Some(&idx) = self.node_indices.get(path) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_path())
            .collect()
    }

    pub fn symbol_index(&self) -> &IndexMap<String, PathBuf> {
        &self.symbol_index
    }

    pub fn symbol_conflicts(&self) -> &[SymbolConflict] {
        &self.symbol_conflicts
    }

    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            total_files: self.files.len(),
            total_exports: self.files.values().map(|f| f.exports.len()).sum(),
            total_imports: self.files.values().map(|f| f.imports.len()).sum(),
            parse_error_count: self.files.values().map(|f| f.parse_errors.len()).sum(),
        }
    }

    /// The mapping-shaped artifact of §external interfaces: forward graph,
    /// its exact transpose, the symbol index and summary counts.
    pub fn export_document(&self) -> ContextDocument {
        let mut dependency_graph = IndexMap::new();
        let mut reverse_graph = IndexMap::new();
        for (path, analysis) in &self.files {
            dependency_graph.insert(
                path_key(path),
                analysis
                    .dependencies
                    .iter()
                    .filter(|d| self.files.contains_key(*d))
                    .map(|d| path_key(d))
                    .collect(),
            );
            reverse_graph.insert(
                path_key(path),
                analysis.dependents.iter().map(|d| path_key(d)).collect(),
            );
        }
        ContextDocument {
            files: self
                .files
                .iter()
                .map(|(p, a)| (path_key(p), a.clone()))
                .collect(),
            dependency_graph,
            reverse_graph,
            symbol_index: self
                .symbol_index
                .iter()
                .map(|(name, p)| (name.clone(), path_key(p)))
                .collect(),
            symbol_conflicts: self.symbol_conflicts.clone(),
            summary: self.summary(),
        }
    }
}

/// Stable, platform-independent string key for a workspace-relative path
fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
