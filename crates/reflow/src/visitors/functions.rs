//! Function signature collection from the top level of a file.

use tree_sitter::Node;

use super::{collect_params, has_keyword_child};
use crate::{
    parser::SyntaxTree,
    semantic::{ExportedSymbol, FunctionSignature},
};

/// Collects [`FunctionSignature`]s: declarations, arrow/function-expression
/// bindings, and the same forms nested one level under `export`.
pub struct FunctionCollector<'a> {
    tree: &'a SyntaxTree,
    functions: Vec<FunctionSignature>,
}

impl<'a> FunctionCollector<'a> {
    pub fn collect(tree: &'a SyntaxTree, exports: &[ExportedSymbol]) -> Vec<FunctionSignature> {
        let mut collector = Self {
            tree,
            functions: Vec::new(),
        };
        let root = tree.root();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            collector.visit_top_level(child, false);
        }
        for function in &mut collector.functions {
            if exports.iter().any(|e| e.name == function.name) {
                function.is_exported = true;
            }
        }
        collector.functions
    }

    fn visit_top_level(&mut self, node: Node<'_>, exported: bool) {
        match node.kind() {
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    self.visit_top_level(declaration, true);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                self.visit_function_declaration(node, exported);
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variable_bindings(node, exported);
            }
            _ => {}
        }
    }

    fn visit_function_declaration(&mut self, node: Node<'_>, exported: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let params = node
            .child_by_field_name("parameters")
            .map(|p| collect_params(p, self.tree.source()))
            .unwrap_or_default();
        self.functions.push(FunctionSignature {
            name: self.tree.node_text(name_node).to_owned(),
            line: self.tree.node_line(node),
            params,
            is_async: has_keyword_child(node, "async"),
            is_arrow: false,
            is_exported: exported,
        });
    }

    fn visit_variable_bindings(&mut self, node: Node<'_>, exported: bool) {
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let (Some(name_node), Some(value)) = (
                declarator.child_by_field_name("name"),
                declarator.child_by_field_name("value"),
            ) else {
                continue;
            };
            if !matches!(value.kind(), "arrow_function" | "function_expression") {
                continue;
            }
            let params = value
                .child_by_field_name("parameters")
                .map(|p| collect_params(p, self.tree.source()))
                .or_else(|| {
                    // single-parameter arrow without parentheses
                    value
                        .child_by_field_name("parameter")
                        .map(|p| vec![self.tree.node_text(p).to_owned()])
                })
                .unwrap_or_default();
            self.functions.push(FunctionSignature {
                name: self.tree.node_text(name_node).to_owned(),
                line: self.tree.node_line(declarator),
                params,
                is_async: has_keyword_child(value, "async"),
                is_arrow: value.kind() == "arrow_function",
                is_exported: exported,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{SourceLanguage, parse_source};
    use crate::visitors::ExportCollector;

    fn functions_of(source: &str) -> Vec<FunctionSignature> {
        let tree =
            parse_source(source, SourceLanguage::TypeScript).expect("fixture source must parse");
        let exports = ExportCollector::collect(&tree);
        FunctionCollector::collect(&tree, &exports)
    }

    #[test]
    fn declaration_and_arrow_forms() {
        let functions = functions_of(
            "function plain(a, b) {}\nconst arrow = async (x) => x;\nconst short = y => y;\n",
        );
        assert_eq!(functions.len(), 3);
        assert!(!functions[0].is_arrow);
        assert_eq!(functions[0].params, vec!["a", "b"]);
        assert!(functions[1].is_arrow);
        assert!(functions[1].is_async);
        assert_eq!(functions[2].params, vec!["y"]);
    }

    #[test]
    fn exported_functions_are_flagged() {
        let functions = functions_of("export function run() {}\nfunction local() {}\n");
        assert_eq!(functions.len(), 2);
        assert!(functions[0].is_exported);
        assert!(!functions[1].is_exported);
    }

    #[test]
    fn non_function_bindings_are_skipped() {
        let functions = functions_of("const n = 42;\nlet s = 'x';\n");
        assert!(functions.is_empty());
    }
}
