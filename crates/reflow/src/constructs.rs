//! Construct inventory: the units of code tracked for refactoring.
//!
//! A construct is a top-level function, hook, component, class or constant,
//! plus one module-level construct for the whole file. Identities are
//! stable across runs so the registry can key state on them; the id is
//! `file_path::construct_name`, disambiguated by the structural path when
//! two top-level constructs share a name.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::{
    parser::{SourceLanguage, SyntaxTree},
    visitors::{BodyFacts, BodyFactsDetector, is_hook_name},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructKind {
    Function,
    Hook,
    Component,
    Class,
    Constant,
    Module,
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Hook => write!(f, "hook"),
            Self::Component => write!(f, "component"),
            Self::Class => write!(f, "class"),
            Self::Constant => write!(f, "constant"),
            Self::Module => write!(f, "module"),
        }
    }
}

/// Stable key for one tracked construct
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructIdentity {
    pub file_path: PathBuf,
    pub kind: ConstructKind,
    pub name: String,
    /// Position of the construct among the file's top-level statements,
    /// e.g. `program[3]`; the collision disambiguator
    pub structural_path: String,
}

impl ConstructIdentity {
    /// The undisambiguated join key between classification, registry and
    /// receipts
    pub fn base_id(&self) -> String {
        format!("{}::{}", self.file_path.display(), self.name)
    }
}

/// One extracted construct: identity plus the exact source span and the
/// precomputed body facts the classifier consumes
#[derive(Debug, Clone)]
pub struct ConstructSource {
    pub identity: ConstructIdentity,
    /// Unique id; equals `base_id()` unless a sibling shares the name
    pub id: String,
    pub line: usize,
    pub text: String,
    pub leading_comment: Option<String>,
    pub facts: BodyFacts,
}

/// Extract all tracked constructs from one parsed file, the module-level
/// construct first.
pub fn extract_constructs(tree: &SyntaxTree, path: &Path) -> Vec<ConstructSource> {
    let root = tree.root();
    let mut constructs = vec![ConstructSource {
        identity: ConstructIdentity {
            file_path: path.to_path_buf(),
            kind: ConstructKind::Module,
            name: module_name(path),
            structural_path: "program".to_owned(),
        },
        id: String::new(),
        line: 1,
        text: tree.source().to_owned(),
        leading_comment: leading_file_comment(tree),
        facts: BodyFactsDetector::scan(tree, root),
    }];

    let mut cursor = root.walk();
    for (index, child) in root.named_children(&mut cursor).enumerate() {
        let target = match child.kind() {
            "export_statement" => match child.child_by_field_name("declaration") {
                Some(declaration) => declaration,
                None => continue,
            },
            _ => child,
        };
        collect_from_statement(tree, path, target, child, index, &mut constructs);
    }

    assign_ids(&mut constructs);
    constructs
}

fn collect_from_statement(
    tree: &SyntaxTree,
    path: &Path,
    node: Node<'_>,
    statement: Node<'_>,
    index: usize,
    constructs: &mut Vec<ConstructSource>,
) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = tree.node_text(name_node).to_owned();
                let kind = function_kind(&name, tree.language());
                constructs.push(make_construct(tree, path, statement, node, name, kind, index));
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = tree.node_text(name_node).to_owned();
                constructs.push(make_construct(
                    tree,
                    path,
                    statement,
                    node,
                    name,
                    ConstructKind::Class,
                    index,
                ));
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name_node) = declarator.child_by_field_name("name") else {
                    continue;
                };
                let name = tree.node_text(name_node).to_owned();
                let is_function = declarator
                    .child_by_field_name("value")
                    .is_some_and(|v| matches!(v.kind(), "arrow_function" | "function_expression"));
                let kind = if is_function {
                    function_kind(&name, tree.language())
                } else {
                    ConstructKind::Constant
                };
                constructs.push(make_construct(tree, path, statement, node, name, kind, index));
            }
        }
        _ => {}
    }
}

fn make_construct(
    tree: &SyntaxTree,
    path: &Path,
    statement: Node<'_>,
    node: Node<'_>,
    name: String,
    kind: ConstructKind,
    index: usize,
) -> ConstructSource {
    ConstructSource {
        identity: ConstructIdentity {
            file_path: path.to_path_buf(),
            kind,
            name,
            structural_path: format!("program[{index}]"),
        },
        id: String::new(),
        line: tree.node_line(statement),
        text: tree.node_text(statement).to_owned(),
        leading_comment: leading_comment(tree, statement),
        facts: BodyFactsDetector::scan(tree, node),
    }
}

/// Hooks are `use`-prefixed; components are PascalCase function values in
/// JSX-flavored files. Everything else is a plain function.
fn function_kind(name: &str, language: SourceLanguage) -> ConstructKind {
    if is_hook_name(name) {
        ConstructKind::Hook
    } else if language == SourceLanguage::Tsx
        && name.chars().next().is_some_and(char::is_uppercase)
    {
        ConstructKind::Component
    } else {
        ConstructKind::Function
    }
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

/// The comment immediately above a top-level statement, if any
fn leading_comment(tree: &SyntaxTree, statement: Node<'_>) -> Option<String> {
    let prev = statement.prev_named_sibling()?;
    if prev.kind() == "comment" && prev.end_position().row + 1 >= statement.start_position().row {
        Some(tree.node_text(prev).to_owned())
    } else {
        None
    }
}

/// A comment opening the file applies to the module-level construct
fn leading_file_comment(tree: &SyntaxTree) -> Option<String> {
    let first = tree.root().named_child(0)?;
    if first.kind() == "comment" {
        Some(tree.node_text(first).to_owned())
    } else {
        None
    }
}

/// Assign unique ids: `file::name`, with the structural path appended for
/// name collisions within the file.
fn assign_ids(constructs: &mut [ConstructSource]) {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for construct in constructs.iter() {
        *counts.entry(construct.identity.base_id()).or_default() += 1;
    }
    for construct in constructs.iter_mut() {
        let base = construct.identity.base_id();
        construct.id = if counts[&base] > 1 {
            format!("{base}@{}", construct.identity.structural_path)
        } else {
            base
        };
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::parser::parse_source;

    fn constructs_of(source: &str, name: &str) -> Vec<ConstructSource> {
        let path = PathBuf::from(name);
        let tree = parse_source(source, SourceLanguage::from_path(Path::new(name)))
            .expect("fixture source must parse");
        extract_constructs(&tree, &path)
    }

    #[test]
    fn module_construct_comes_first() {
        let constructs = constructs_of("export const n = 1;\n", "src/nums.ts");
        assert_eq!(constructs[0].identity.kind, ConstructKind::Module);
        assert_eq!(constructs[0].identity.name, "nums");
        assert_eq!(constructs[0].id, "src/nums.ts::nums");
    }

    #[test]
    fn kinds_are_inferred_from_name_and_flavor() {
        let constructs = constructs_of(
            "export function useCart() {}\nexport function Cart() {}\nfunction total() {}\nconst \
             TAX = 0.2;\nclass Store {}\n",
            "src/cart.tsx",
        );
        let kinds: Vec<_> = constructs[1..]
            .iter()
            .map(|c| (c.identity.name.as_str(), c.identity.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("useCart", ConstructKind::Hook),
                ("Cart", ConstructKind::Component),
                ("total", ConstructKind::Function),
                ("TAX", ConstructKind::Constant),
                ("Store", ConstructKind::Class),
            ]
        );
    }

    #[test]
    fn pascal_case_in_plain_ts_is_a_function_not_component() {
        let constructs = constructs_of("export function Builder() {}\n", "src/b.ts");
        assert_eq!(constructs[1].identity.kind, ConstructKind::Function);
    }

    #[test]
    fn colliding_names_are_disambiguated_by_structural_path() {
        // A const and a class may not collide in valid JS, but overload-like
        // declarations can; simulate with two declarators named alike.
        let constructs = constructs_of(
            "function render() {}\nconst render = 1;\n",
            "src/dup.ts",
        );
        let ids: Vec<_> = constructs[1..].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert!(ids.iter().all(|id| id.starts_with("src/dup.ts::render@")));
    }

    #[test]
    fn leading_comment_is_attached() {
        let constructs = constructs_of(
            "// @pure\nexport function formatName(u) { return u.name; }\n",
            "src/fmt.ts",
        );
        assert_eq!(
            constructs[1].leading_comment.as_deref(),
            Some("// @pure")
        );
    }

    #[test]
    fn construct_text_is_the_exact_span() {
        let constructs = constructs_of("const a = 1;\nconst b = 2;\n", "src/two.ts");
        assert_eq!(constructs[1].text, "const a = 1;");
        assert_eq!(constructs[2].text, "const b = 2;");
    }
}
