//! Syntax-tree visitors, one collector per concern.
//!
//! Each collector walks by node kind (structural match, never string
//! shape), so aliasing, re-exports, type-only imports and dynamic imports
//! are represented precisely.

mod body_facts;
mod exports;
mod functions;
mod imports;

pub use body_facts::{BodyFacts, BodyFactsDetector};
pub(crate) use body_facts::is_hook_name;
pub use exports::ExportCollector;
pub use functions::FunctionCollector;
pub use imports::ImportCollector;

use tree_sitter::Node;

/// Text of a `string` literal node with its quotes stripped
pub(crate) fn string_literal_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    let raw = node.utf8_text(source.as_bytes()).unwrap_or("");
    raw.trim_matches(|c| c == '\'' || c == '"' || c == '`')
}

/// Whether a node has an anonymous child token of the given kind
/// (e.g. `type` on `import type`, `default` on `export default`)
pub(crate) fn has_keyword_child(node: Node<'_>, keyword: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == keyword)
}

/// Parameter names from a `formal_parameters` node. TS parameter wrappers
/// are unwrapped to their pattern so type annotations do not leak in.
pub(crate) fn collect_params(node: Node<'_>, source: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let pattern = match child.kind() {
            "required_parameter" | "optional_parameter" => {
                child.child_by_field_name("pattern").unwrap_or(child)
            }
            _ => child,
        };
        let text = pattern.utf8_text(source.as_bytes()).unwrap_or("");
        if !text.is_empty() {
            params.push(text.to_owned());
        }
    }
    params
}
