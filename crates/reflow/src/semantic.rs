//! Per-file semantic analysis: exports, imports, and function signatures
//! extracted by structural match on syntax-tree node kinds.
//!
//! A [`FileAnalysis`] is built fresh from current file contents on every run
//! and never mutated in place; re-analysis replaces the old value wholesale.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    parser::SyntaxTree,
    resolver::ImportResolver,
    visitors::{ExportCollector, FunctionCollector, ImportCollector},
};

/// How a symbol leaves a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Named,
    Default,
    ReExport,
    Type,
}

/// How a symbol enters a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    Named,
    Default,
    Namespace,
    SideEffect,
    Dynamic,
    Type,
}

/// One exported symbol, as written at its export site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedSymbol {
    pub name: String,
    pub kind: ExportKind,
    pub line: usize,
    pub is_function: bool,
    pub is_class: bool,
    pub is_constant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    /// For `export { original as name }` and re-exports: the source-side name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

/// One imported binding. Aliased, namespace, type-only, side-effect and
/// dynamic imports are kept distinct rather than collapsed into one bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedSymbol {
    pub name: String,
    pub kind: ImportKind,
    pub source_module: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub is_type_only: bool,
}

/// Signature facts for a function defined in the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub line: usize,
    pub params: Vec<String>,
    pub is_async: bool,
    pub is_arrow: bool,
    pub is_exported: bool,
}

/// Complete analysis of one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Workspace-relative path; the unique key for this file
    pub path: PathBuf,
    pub exports: Vec<ExportedSymbol>,
    pub imports: Vec<ImportedSymbol>,
    pub functions: Vec<FunctionSignature>,
    /// Resolved, existing first-party files this file imports
    pub dependencies: IndexSet<PathBuf>,
    /// Derived during context construction, never authored here
    pub dependents: IndexSet<PathBuf>,
    pub parse_errors: Vec<String>,
    /// Relative imports that resolved to no existing file. Retained as
    /// analysis notes; they never enter the dependency graph.
    pub unresolved_imports: Vec<String>,
}

impl FileAnalysis {
    /// An analysis carrying only parse errors, for files the adapter could
    /// not produce a tree for. Keeps the batch going per the failure policy.
    pub fn parse_failed(path: PathBuf, error: String) -> Self {
        Self {
            path,
            exports: Vec::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            parse_errors: vec![error],
            unresolved_imports: Vec::new(),
        }
    }

    pub fn has_parse_errors(&self) -> bool {
        !self.parse_errors.is_empty()
    }
}

/// Walk one syntax tree and produce its [`FileAnalysis`].
///
/// `path` is the workspace-relative key for the file. Relative import
/// specifiers are resolved against the filesystem through `resolver`;
/// package specifiers are recorded on the imports but never resolved, so
/// the dependency graph stays intra-project.
pub fn analyze_file(tree: &SyntaxTree, path: &Path, resolver: &ImportResolver) -> FileAnalysis {
    let exports = ExportCollector::collect(tree);
    let imports = ImportCollector::collect(tree);
    let functions = FunctionCollector::collect(tree, &exports);

    let mut dependencies = IndexSet::new();
    let mut unresolved_imports = Vec::new();
    for import in &imports {
        let specifier = import.source_module.as_str();
        if !ImportResolver::is_relative(specifier) {
            continue;
        }
        match resolver.resolve_relative(path, specifier) {
            Some(target) => {
                dependencies.insert(target);
            }
            None => {
                debug!(
                    "unresolved relative import '{specifier}' in {} (line {})",
                    path.display(),
                    import.line
                );
                unresolved_imports.push(format!(
                    "line {}: cannot resolve '{specifier}'",
                    import.line
                ));
            }
        }
    }

    let parse_errors = tree
        .syntax_errors()
        .into_iter()
        .map(|e| e.message)
        .collect();

    FileAnalysis {
        path: path.to_path_buf(),
        exports,
        imports,
        functions,
        dependencies,
        dependents: IndexSet::new(),
        parse_errors,
        unresolved_imports,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::parser::{SourceLanguage, parse_source};

    fn analyze(source: &str, name: &str, root: &Path) -> FileAnalysis {
        let path = Path::new(name);
        let tree = parse_source(source, SourceLanguage::from_path(path))
            .expect("fixture source must parse");
        analyze_file(&tree, path, &ImportResolver::new(root))
    }

    #[test]
    fn package_imports_are_recorded_but_not_resolved() {
        let dir = TempDir::new().unwrap();
        let analysis = analyze(
            "import React from 'react';\nimport { debounce } from 'lodash';\n",
            "app.js",
            dir.path(),
        );
        assert_eq!(analysis.imports.len(), 2);
        assert!(analysis.dependencies.is_empty());
        assert!(analysis.unresolved_imports.is_empty());
    }

    #[test]
    fn unresolved_relative_import_is_noted_not_dropped() {
        let dir = TempDir::new().unwrap();
        let analysis = analyze("import { x } from './missing';\n", "app.js", dir.path());
        assert!(analysis.dependencies.is_empty());
        assert_eq!(analysis.unresolved_imports.len(), 1);
        assert!(analysis.unresolved_imports[0].contains("./missing"));
    }

    #[test]
    fn resolved_relative_import_becomes_dependency() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("util.ts"), "export const n = 1;\n").unwrap();
        let analysis = analyze("import { n } from './util';\n", "app.ts", dir.path());
        assert_eq!(analysis.dependencies.len(), 1);
        assert!(analysis.dependencies.contains(Path::new("util.ts")));
    }

    #[test]
    fn parse_errors_do_not_hide_earlier_constructs() {
        let dir = TempDir::new().unwrap();
        let analysis = analyze(
            "export function good() {}\nfunction ((( broken\n",
            "bad.js",
            dir.path(),
        );
        assert!(analysis.has_parse_errors());
        assert!(analysis.exports.iter().any(|e| e.name == "good"));
    }
}
