#![allow(clippy::disallowed_methods)]

use std::{fs, path::Path};

use pretty_assertions::assert_eq;
use reflow::pipeline::{AnalysisOptions, analyze_tree};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[test]
fn resolution_correctness_end_to_end() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.js", "export const A = 1;\n");
    write(dir.path(), "b.js", "import { A } from './a';\nexport const B = A + 1;\n");

    let outcome = analyze_tree(dir.path(), &AnalysisOptions::default()).unwrap();
    let doc = outcome.context.export_document();

    assert_eq!(doc.dependency_graph["b.js"], vec!["a.js".to_owned()]);
    assert_eq!(doc.reverse_graph["a.js"], vec!["b.js".to_owned()]);
    assert_eq!(doc.symbol_index["A"], "a.js");
    assert_eq!(doc.summary.total_files, 2);
}

#[test]
fn non_relative_imports_are_excluded_from_the_graph() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app.js",
        "import React from 'react';\nimport axios from 'axios';\nexport const app = 1;\n",
    );

    let outcome = analyze_tree(dir.path(), &AnalysisOptions::default()).unwrap();
    let analysis = outcome.context.file(Path::new("app.js")).unwrap();
    assert!(analysis.dependencies.is_empty());
    assert_eq!(analysis.imports.len(), 2, "imports are still recorded");
}

#[test]
fn graph_consistency_over_a_nested_tree() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "import { api } from './api';\nimport { fmt } from './utils/format';\nexport const main = () => api(fmt('x'));\n");
    write(dir.path(), "src/api.ts", "import { fmt } from './utils/format';\nexport const api = (s: string) => s;\n");
    write(dir.path(), "src/utils/format.ts", "export const fmt = (s: string) => s.trim();\n");
    write(dir.path(), "src/widgets/index.tsx", "export const Widget = () => <div/>;\n");

    let outcome = analyze_tree(dir.path(), &AnalysisOptions::default()).unwrap();
    let doc = outcome.context.export_document();

    // forward and reverse graphs are exact transposes
    for (file, deps) in &doc.dependency_graph {
        for dep in deps {
            assert!(doc.reverse_graph[dep].contains(file));
        }
    }
    for (file, dependents) in &doc.reverse_graph {
        for dependent in dependents {
            assert!(doc.dependency_graph[dependent].contains(file));
        }
    }

    // both importers of the shared util are seen
    let mut format_dependents = doc.reverse_graph["src/utils/format.ts"].clone();
    format_dependents.sort();
    assert_eq!(format_dependents, vec!["src/api.ts", "src/index.ts"]);
}

#[test]
fn directory_index_resolution_inside_a_tree() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/app.tsx", "import { Widget } from './widgets';\nexport const App = () => <Widget/>;\n");
    write(dir.path(), "src/widgets/index.tsx", "export const Widget = () => <span/>;\n");

    let outcome = analyze_tree(dir.path(), &AnalysisOptions::default()).unwrap();
    let analysis = outcome.context.file(Path::new("src/app.tsx")).unwrap();
    assert!(
        analysis
            .dependencies
            .contains(Path::new("src/widgets/index.tsx"))
    );
}

#[test]
fn symbol_index_points_at_defining_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "models.ts", "export interface User { id: string }\nexport const EMPTY_USER = { id: '' };\n");
    write(dir.path(), "store.ts", "import { EMPTY_USER } from './models';\nexport function makeStore() { return EMPTY_USER; }\n");

    let outcome = analyze_tree(dir.path(), &AnalysisOptions::default()).unwrap();
    let index = outcome.context.symbol_index();
    assert_eq!(index["User"], Path::new("models.ts"));
    assert_eq!(index["EMPTY_USER"], Path::new("models.ts"));
    assert_eq!(index["makeStore"], Path::new("store.ts"));
}
