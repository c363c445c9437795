//! Export collection: named, default, re-export and type-only forms.

use tree_sitter::Node;

use super::{collect_params, has_keyword_child, string_literal_text};
use crate::{
    parser::SyntaxTree,
    semantic::{ExportKind, ExportedSymbol},
};

/// Collects [`ExportedSymbol`]s in source order from the top level of a file.
pub struct ExportCollector<'a> {
    tree: &'a SyntaxTree,
    exports: Vec<ExportedSymbol>,
}

impl<'a> ExportCollector<'a> {
    pub fn collect(tree: &'a SyntaxTree) -> Vec<ExportedSymbol> {
        let mut collector = Self {
            tree,
            exports: Vec::new(),
        };
        let root = tree.root();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() == "export_statement" {
                collector.visit_export_statement(child);
            }
        }
        collector.exports
    }

    fn visit_export_statement(&mut self, node: Node<'_>) {
        let line = self.tree.node_line(node);
        let is_default = has_keyword_child(node, "default");
        let statement_type_only = has_keyword_child(node, "type");
        let source = node
            .child_by_field_name("source")
            .map(|s| string_literal_text(s, self.tree.source()).to_owned());

        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.visit_declaration(declaration, line, is_default);
            return;
        }

        // `export * from './m'` / `export * as ns from './m'`
        if let Some(module) = &source
            && !has_clause(node)
        {
            let name = namespace_export_name(node, self.tree).unwrap_or_else(|| "*".to_owned());
            self.exports.push(ExportedSymbol {
                name,
                kind: ExportKind::ReExport,
                line,
                is_function: false,
                is_class: false,
                is_constant: false,
                params: None,
                original_name: Some(format!("{module}::*")),
            });
            return;
        }

        // `export { a, b as c }` and `export { a } from './m'`
        let mut cursor = node.walk();
        if let Some(clause) = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "export_clause")
        {
            self.visit_export_clause(clause, line, statement_type_only, source.as_deref());
            return;
        }

        // `export default <expression>;`
        if is_default && let Some(value) = node.child_by_field_name("value") {
            self.exports.push(ExportedSymbol {
                name: "default".to_owned(),
                kind: ExportKind::Default,
                line,
                is_function: matches!(value.kind(), "arrow_function" | "function_expression"),
                is_class: value.kind() == "class",
                is_constant: false,
                params: None,
                original_name: None,
            });
        }
    }

    fn visit_export_clause(
        &mut self,
        clause: Node<'_>,
        line: usize,
        statement_type_only: bool,
        source: Option<&str>,
    ) {
        let mut cursor = clause.walk();
        for spec in clause.named_children(&mut cursor) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let local = self.tree.node_text(name_node).to_owned();
            let alias = spec
                .child_by_field_name("alias")
                .map(|a| self.tree.node_text(a).to_owned());
            let type_only = statement_type_only || has_keyword_child(spec, "type");
            let kind = if source.is_some() {
                ExportKind::ReExport
            } else if type_only {
                ExportKind::Type
            } else {
                ExportKind::Named
            };
            // The exported (outer) name is the alias when one exists
            let (name, original_name) = match alias {
                Some(alias) => (alias, Some(local)),
                None => match source {
                    Some(module) => (local.clone(), Some(format!("{module}::{local}"))),
                    None => (local, None),
                },
            };
            self.exports.push(ExportedSymbol {
                name,
                kind,
                line,
                is_function: false,
                is_class: false,
                is_constant: false,
                params: None,
                original_name,
            });
        }
    }

    fn visit_declaration(&mut self, declaration: Node<'_>, line: usize, is_default: bool) {
        let kind = if is_default {
            ExportKind::Default
        } else {
            ExportKind::Named
        };
        match declaration.kind() {
            "function_declaration" | "generator_function_declaration" => {
                let name = self.declaration_name(declaration, is_default);
                let params = declaration
                    .child_by_field_name("parameters")
                    .map(|p| collect_params(p, self.tree.source()));
                self.exports.push(ExportedSymbol {
                    name,
                    kind,
                    line,
                    is_function: true,
                    is_class: false,
                    is_constant: false,
                    params,
                    original_name: None,
                });
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.exports.push(ExportedSymbol {
                    name: self.declaration_name(declaration, is_default),
                    kind,
                    line,
                    is_function: false,
                    is_class: true,
                    is_constant: false,
                    params: None,
                    original_name: None,
                });
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variable_declaration(declaration, kind, line);
            }
            "interface_declaration" | "type_alias_declaration" => {
                self.exports.push(ExportedSymbol {
                    name: self.declaration_name(declaration, is_default),
                    kind: ExportKind::Type,
                    line,
                    is_function: false,
                    is_class: false,
                    is_constant: false,
                    params: None,
                    original_name: None,
                });
            }
            "enum_declaration" => {
                self.exports.push(ExportedSymbol {
                    name: self.declaration_name(declaration, is_default),
                    kind,
                    line,
                    is_function: false,
                    is_class: false,
                    is_constant: true,
                    params: None,
                    original_name: None,
                });
            }
            _ => {}
        }
    }

    fn visit_variable_declaration(&mut self, declaration: Node<'_>, kind: ExportKind, line: usize) {
        let is_const = declaration
            .child(0)
            .is_some_and(|c| self.tree.node_text(c) == "const");
        let mut cursor = declaration.walk();
        for declarator in declaration.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let value = declarator.child_by_field_name("value");
            let is_function = value
                .is_some_and(|v| matches!(v.kind(), "arrow_function" | "function_expression"));
            let params = value
                .filter(|_| is_function)
                .and_then(|v| {
                    v.child_by_field_name("parameters")
                        .or_else(|| v.child_by_field_name("parameter"))
                })
                .map(|p| match p.kind() {
                    "formal_parameters" => collect_params(p, self.tree.source()),
                    _ => vec![self.tree.node_text(p).to_owned()],
                });
            self.exports.push(ExportedSymbol {
                name: self.tree.node_text(name_node).to_owned(),
                kind,
                line,
                is_function,
                is_class: false,
                is_constant: is_const && !is_function,
                params,
                original_name: None,
            });
        }
    }

    fn declaration_name(&self, declaration: Node<'_>, is_default: bool) -> String {
        declaration
            .child_by_field_name("name")
            .map_or_else(
                || if is_default { "default" } else { "" }.to_owned(),
                |n| self.tree.node_text(n).to_owned(),
            )
    }
}

fn has_clause(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .any(|c| c.kind() == "export_clause")
}

fn namespace_export_name(node: Node<'_>, tree: &SyntaxTree) -> Option<String> {
    let mut cursor = node.walk();
    let ns = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "namespace_export")?;
    let mut ns_cursor = ns.walk();
    ns.named_children(&mut ns_cursor)
        .find(|c| c.kind() == "identifier" || c.kind() == "string")
        .map(|n| tree.node_text(n).to_owned())
}
