//! Parser adapter over tree-sitter for the JavaScript language family.
//!
//! Every call builds its own `tree_sitter::Parser`, so parses are independent
//! and safe to run concurrently. Plain JavaScript is parsed with the
//! TypeScript grammar (a strict superset for our purposes); `.tsx`/`.jsx`
//! files use the TSX grammar.

use std::{fmt, path::Path};

use tree_sitter::{Language, Node, Parser, Tree};

/// Language flavor derived from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    /// `.ts`, `.mts`, `.cts`
    TypeScript,
    /// `.tsx`, `.jsx`
    Tsx,
    /// `.js`, `.mjs`, `.cjs` and anything else we are asked to parse
    JavaScript,
}

impl SourceLanguage {
    /// Derive the language flavor from a path's extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts" | "mts" | "cts") => Self::TypeScript,
            Some("tsx" | "jsx") => Self::Tsx,
            _ => Self::JavaScript,
        }
    }

    fn grammar(self) -> Language {
        match self {
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            // JS and TS share the TypeScript grammar
            Self::TypeScript | Self::JavaScript => {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
            }
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeScript => write!(f, "typescript"),
            Self::Tsx => write!(f, "tsx"),
            Self::JavaScript => write!(f, "javascript"),
        }
    }
}

/// Structured parse failure: a message plus the byte offset where parsing
/// gave up. The adapter never panics on malformed input.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub message: String,
    pub byte_offset: usize,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.byte_offset)
    }
}

impl std::error::Error for ParseFailure {}

/// A syntax error embedded in an otherwise usable tree
#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub byte_offset: usize,
    pub line: usize,
    pub message: String,
}

/// A parsed file: the tree-sitter tree plus the source it was parsed from
#[derive(Debug)]
pub struct SyntaxTree {
    tree: Tree,
    source: String,
    language: SourceLanguage,
}

impl SyntaxTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// Source text covered by a node
    pub fn node_text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// 1-based line of a node's start
    pub fn node_line(&self, node: Node<'_>) -> usize {
        node.start_position().row + 1
    }

    /// Collect `ERROR`/`MISSING` nodes. These are recoverable: the rest of
    /// the tree is still walkable and callers record them per file.
    pub fn syntax_errors(&self) -> Vec<SyntaxError> {
        let mut errors = Vec::new();
        if self.tree.root_node().has_error() {
            collect_error_nodes(self.tree.root_node(), &mut errors);
        }
        errors
    }
}

fn collect_error_nodes(node: Node<'_>, errors: &mut Vec<SyntaxError>) {
    if node.is_error() {
        errors.push(SyntaxError {
            byte_offset: node.start_byte(),
            line: node.start_position().row + 1,
            message: format!("syntax error at line {}", node.start_position().row + 1),
        });
        return;
    }
    if node.is_missing() {
        errors.push(SyntaxError {
            byte_offset: node.start_byte(),
            line: node.start_position().row + 1,
            message: format!(
                "missing {} at line {}",
                node.kind(),
                node.start_position().row + 1
            ),
        });
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, errors);
    }
}

/// Parse source text into a syntax tree, or a structured failure.
///
/// A tree containing error nodes is still `Ok`: per-file syntax errors are
/// recoverable and surfaced via [`SyntaxTree::syntax_errors`]. `Err` means
/// the parser produced no tree at all.
pub fn parse_source(source: &str, language: SourceLanguage) -> Result<SyntaxTree, ParseFailure> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|e| ParseFailure {
            message: format!("failed to load {language} grammar: {e}"),
            byte_offset: 0,
        })?;

    match parser.parse(source, None) {
        Some(tree) => Ok(SyntaxTree {
            tree,
            source: source.to_owned(),
            language,
        }),
        None => Err(ParseFailure {
            message: format!("{language} parser produced no tree"),
            byte_offset: 0,
        }),
    }
}
