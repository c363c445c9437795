//! Import discovery: collects every way a binding enters a module.

use tree_sitter::Node;

use super::{has_keyword_child, string_literal_text};
use crate::{
    parser::SyntaxTree,
    semantic::{ImportKind, ImportedSymbol},
};

/// Collects [`ImportedSymbol`]s from a parsed file.
///
/// Static `import` statements only occur at the top level; dynamic
/// `import()` calls are found anywhere in the tree.
pub struct ImportCollector<'a> {
    tree: &'a SyntaxTree,
    imports: Vec<ImportedSymbol>,
}

impl<'a> ImportCollector<'a> {
    pub fn collect(tree: &'a SyntaxTree) -> Vec<ImportedSymbol> {
        let mut collector = Self {
            tree,
            imports: Vec::new(),
        };
        let root = tree.root();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() == "import_statement" {
                collector.visit_import_statement(child);
            }
        }
        collector.walk_dynamic_imports(root);
        collector.imports
    }

    fn visit_import_statement(&mut self, node: Node<'_>) {
        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let source_module = string_literal_text(source_node, self.tree.source()).to_owned();
        let line = self.tree.node_line(node);
        let statement_type_only = has_keyword_child(node, "type");

        let mut cursor = node.walk();
        let clause = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "import_clause");

        let Some(clause) = clause else {
            // `import './styles.css'`: imported for effect only
            self.imports.push(ImportedSymbol {
                name: source_module.clone(),
                kind: ImportKind::SideEffect,
                source_module,
                line,
                alias: None,
                is_type_only: false,
            });
            return;
        };

        let mut clause_cursor = clause.walk();
        for part in clause.named_children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => self.push(
                    self.tree.node_text(part),
                    ImportKind::Default,
                    &source_module,
                    line,
                    None,
                    statement_type_only,
                ),
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    if let Some(name) = part
                        .named_children(&mut ns_cursor)
                        .find(|c| c.kind() == "identifier")
                    {
                        self.push(
                            self.tree.node_text(name),
                            ImportKind::Namespace,
                            &source_module,
                            line,
                            None,
                            statement_type_only,
                        );
                    }
                }
                "named_imports" => {
                    self.visit_named_imports(part, &source_module, line, statement_type_only);
                }
                _ => {}
            }
        }
    }

    fn visit_named_imports(
        &mut self,
        node: Node<'_>,
        source_module: &str,
        line: usize,
        statement_type_only: bool,
    ) {
        let mut cursor = node.walk();
        for spec in node.named_children(&mut cursor) {
            if spec.kind() != "import_specifier" {
                continue;
            }
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let alias = spec
                .child_by_field_name("alias")
                .map(|a| self.tree.node_text(a).to_owned());
            let type_only = statement_type_only || has_keyword_child(spec, "type");
            self.push(
                self.tree.node_text(name_node),
                if type_only {
                    ImportKind::Type
                } else {
                    ImportKind::Named
                },
                source_module,
                line,
                alias,
                type_only,
            );
        }
    }

    /// `import('./module')` can appear in any expression position
    fn walk_dynamic_imports(&mut self, node: Node<'_>) {
        if node.kind() == "call_expression"
            && let Some(function) = node.child_by_field_name("function")
            && function.kind() == "import"
            && let Some(args) = node.child_by_field_name("arguments")
        {
            let mut cursor = args.walk();
            if let Some(arg) = args
                .named_children(&mut cursor)
                .find(|a| a.kind() == "string")
            {
                let source_module = string_literal_text(arg, self.tree.source()).to_owned();
                self.imports.push(ImportedSymbol {
                    name: source_module.clone(),
                    kind: ImportKind::Dynamic,
                    source_module,
                    line: self.tree.node_line(node),
                    alias: None,
                    is_type_only: false,
                });
            }
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_dynamic_imports(child);
        }
    }

    fn push(
        &mut self,
        name: &str,
        kind: ImportKind,
        source_module: &str,
        line: usize,
        alias: Option<String>,
        is_type_only: bool,
    ) {
        let kind = if is_type_only && kind == ImportKind::Named {
            ImportKind::Type
        } else {
            kind
        };
        self.imports.push(ImportedSymbol {
            name: name.to_owned(),
            kind,
            source_module: source_module.to_owned(),
            line,
            alias,
            is_type_only,
        });
    }
}
