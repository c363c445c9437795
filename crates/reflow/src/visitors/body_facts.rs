//! Body-level fact detection for zone classification and anti-pattern
//! scanning.
//!
//! The detector answers a small fixed set of questions about a construct's
//! body: does it call mutating methods, reassign bindings, touch `this`,
//! call hooks, or loop imperatively. Zone policy lives in the classifier;
//! this visitor only reports what the code contains.

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::parser::SyntaxTree;

/// Methods that mutate their receiver in place
static MUTATING_METHODS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "push",
        "pop",
        "shift",
        "unshift",
        "splice",
        "sort",
        "reverse",
        "fill",
        "copyWithin",
        "set",
        "delete",
        "add",
        "clear",
        "defineProperty",
        "assign",
    ]
    .into_iter()
    .collect()
});

/// A React-style hook name: `use` followed by an uppercase letter
pub(crate) fn is_hook_name(name: &str) -> bool {
    name.strip_prefix("use")
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_uppercase)
}

/// Precomputed facts about a construct's body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodyFacts {
    /// Receiver.method pairs for mutating calls, e.g. `items.push`
    pub mutation_calls: Vec<String>,
    /// Count of assignments/augmented assignments/increments
    pub reassignments: usize,
    pub uses_this: bool,
    pub hook_calls: Vec<String>,
    /// `for`/`while`/`do` statements
    pub imperative_loops: usize,
}

impl BodyFacts {
    pub fn is_clean(&self) -> bool {
        self.mutation_calls.is_empty()
            && self.reassignments == 0
            && !self.uses_this
            && self.imperative_loops == 0
    }

    /// Render each fact as a reportable anti-pattern finding. The caller
    /// decides whether the construct's zone makes these actionable.
    pub fn anti_pattern_findings(&self) -> Vec<String> {
        let mut findings = Vec::new();
        for call in &self.mutation_calls {
            findings.push(format!("mutating call: {call}"));
        }
        if self.reassignments > 0 {
            findings.push(format!("{} reassignment(s)", self.reassignments));
        }
        if self.uses_this {
            findings.push("uses `this`".to_owned());
        }
        if self.imperative_loops > 0 {
            findings.push(format!("{} imperative loop(s)", self.imperative_loops));
        }
        findings
    }
}

/// Single-pass detector over a construct's subtree
pub struct BodyFactsDetector<'a> {
    tree: &'a SyntaxTree,
    facts: BodyFacts,
}

impl<'a> BodyFactsDetector<'a> {
    pub fn scan(tree: &'a SyntaxTree, node: Node<'_>) -> BodyFacts {
        let mut detector = Self {
            tree,
            facts: BodyFacts::default(),
        };
        detector.visit(node);
        detector.facts
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "call_expression" => self.visit_call(node),
            "assignment_expression" | "augmented_assignment_expression" | "update_expression" => {
                self.facts.reassignments += 1;
            }
            "this" => self.facts.uses_this = true,
            "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                self.facts.imperative_loops += 1;
            }
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit_call(&mut self, node: Node<'_>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        match function.kind() {
            "member_expression" => {
                if let Some(property) = function.child_by_field_name("property") {
                    let method = self.tree.node_text(property);
                    if MUTATING_METHODS.contains(method) {
                        self.facts
                            .mutation_calls
                            .push(self.tree.node_text(function).to_owned());
                    }
                }
            }
            "identifier" => {
                let name = self.tree.node_text(function);
                if is_hook_name(name) {
                    self.facts.hook_calls.push(name.to_owned());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{SourceLanguage, parse_source};

    fn facts_of(source: &str) -> BodyFacts {
        let tree =
            parse_source(source, SourceLanguage::TypeScript).expect("fixture source must parse");
        BodyFactsDetector::scan(&tree, tree.root())
    }

    #[test]
    fn clean_pure_function() {
        let facts = facts_of(
            "function total(items) {\n  return items.reduce((acc, i) => acc + i.price, 0);\n}\n",
        );
        assert!(facts.is_clean());
        assert!(facts.anti_pattern_findings().is_empty());
    }

    #[test]
    fn mutation_call_is_detected() {
        let facts = facts_of("function track(items, x) {\n  items.push(x);\n  return items;\n}\n");
        assert_eq!(facts.mutation_calls, vec!["items.push"]);
        assert!(!facts.is_clean());
    }

    #[test]
    fn reassignment_and_loop() {
        let facts = facts_of(
            "function sum(xs) {\n  let t = 0;\n  for (const x of xs) {\n    t += x;\n  }\n  \
             return t;\n}\n",
        );
        assert_eq!(facts.reassignments, 1);
        assert_eq!(facts.imperative_loops, 1);
        let findings = facts.anti_pattern_findings();
        assert!(findings.iter().any(|f| f.contains("reassignment")));
        assert!(findings.iter().any(|f| f.contains("imperative loop")));
    }

    #[test]
    fn this_usage() {
        let facts = facts_of("class A {\n  run() {\n    return this.x;\n  }\n}\n");
        assert!(facts.uses_this);
    }

    #[test]
    fn hook_calls_are_collected_not_flagged() {
        let facts = facts_of(
            "function useCounter() {\n  const [n, setN] = useState(0);\n  return n;\n}\n",
        );
        assert_eq!(facts.hook_calls, vec!["useState"]);
        // Hooks are a classification signal, not an anti-pattern by themselves
        assert!(facts.anti_pattern_findings().is_empty());
    }

    #[test]
    fn local_declarations_are_not_reassignments() {
        let facts = facts_of("function f() {\n  const a = 1;\n  let b = 2;\n  return a + b;\n}\n");
        assert_eq!(facts.reassignments, 0);
    }
}
