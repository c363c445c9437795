//! Versioned zone-rule configuration.
//!
//! Rules load from TOML with serde defaults on every table, so an empty
//! file (or no file at all) yields the built-in rule set. The `version`
//! string participates in classification output: identical input plus
//! identical rule version must classify identically.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Marker annotations that override all heuristics when present in a
/// construct's leading comment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerRules {
    pub pure: String,
    pub io: String,
    pub orchestration: String,
    pub effect_boundary: String,
    pub ignore: String,
}

impl Default for MarkerRules {
    fn default() -> Self {
        Self {
            pure: "@pure".to_owned(),
            io: "@io".to_owned(),
            orchestration: "@orchestration".to_owned(),
            effect_boundary: "@effect-boundary".to_owned(),
            ignore: "@fp-ignore".to_owned(),
        }
    }
}

/// An import-based signal: fires when any import's source module contains
/// `pattern`. Positive weight is purity evidence, negative is effect
/// evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRule {
    pub pattern: String,
    pub weight: f64,
}

impl ImportRule {
    fn new(pattern: &str, weight: f64) -> Self {
        Self {
            pattern: pattern.to_owned(),
            weight,
        }
    }
}

/// A naming-based signal keyed on a construct-name prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingRule {
    pub prefix: String,
    pub weight: f64,
}

impl NamingRule {
    fn new(prefix: &str, weight: f64) -> Self {
        Self {
            prefix: prefix.to_owned(),
            weight,
        }
    }
}

/// Weights for body-level facts; all effect evidence, so all negative
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyWeights {
    pub mutation_call: f64,
    pub reassignment: f64,
    pub this_usage: f64,
    pub hook_usage: f64,
    pub imperative_loop: f64,
}

impl Default for BodyWeights {
    fn default() -> Self {
        Self {
            mutation_call: -2.0,
            reassignment: -1.0,
            this_usage: -1.5,
            hook_usage: -1.5,
            imperative_loop: -1.0,
        }
    }
}

/// Lowest-priority hint keyed on a path fragment; consulted only when no
/// heuristic signal fired
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryHint {
    pub fragment: String,
    pub weight: f64,
}

impl DirectoryHint {
    fn new(fragment: &str, weight: f64) -> Self {
        Self {
            fragment: fragment.to_owned(),
            weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneRules {
    pub version: String,
    pub markers: MarkerRules,
    pub imports: Vec<ImportRule>,
    pub naming: Vec<NamingRule>,
    pub body: BodyWeights,
    pub directories: Vec<DirectoryHint>,
}

impl Default for ZoneRules {
    fn default() -> Self {
        Self {
            version: "builtin-1".to_owned(),
            markers: MarkerRules::default(),
            imports: vec![
                ImportRule::new("fs", -3.0),
                ImportRule::new("http", -3.0),
                ImportRule::new("axios", -3.0),
                ImportRule::new("express", -3.0),
                ImportRule::new("pg", -3.0),
                ImportRule::new("mongoose", -3.0),
                ImportRule::new("react", -1.0),
                ImportRule::new("lodash/fp", 2.0),
                ImportRule::new("ramda", 2.0),
                ImportRule::new("date-fns", 1.0),
            ],
            naming: vec![
                NamingRule::new("fetch", -2.0),
                NamingRule::new("save", -2.0),
                NamingRule::new("write", -2.0),
                NamingRule::new("delete", -2.0),
                NamingRule::new("handle", -1.0),
                NamingRule::new("use", -1.0),
                NamingRule::new("format", 2.0),
                NamingRule::new("compute", 2.0),
                NamingRule::new("calc", 2.0),
                NamingRule::new("parse", 1.5),
                NamingRule::new("to", 1.0),
                NamingRule::new("is", 1.0),
                NamingRule::new("get", 0.5),
            ],
            body: BodyWeights::default(),
            directories: vec![
                DirectoryHint::new("utils", 1.0),
                DirectoryHint::new("lib", 1.0),
                DirectoryHint::new("helpers", 1.0),
                DirectoryHint::new("api", -1.0),
                DirectoryHint::new("services", -1.0),
                DirectoryHint::new("db", -1.0),
            ],
        }
    }
}

impl ZoneRules {
    /// Load rules from a TOML file; missing keys fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading zone rules from {}", path.display()))?;
        let rules: Self = toml::from_str(&text)
            .with_context(|| format!("parsing zone rules from {}", path.display()))?;
        Ok(rules)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_fully_defaulted() {
        let rules: ZoneRules = toml::from_str("").unwrap();
        assert_eq!(rules.version, "builtin-1");
        assert!(!rules.imports.is_empty());
        assert_eq!(rules.markers.pure, "@pure");
    }

    #[test]
    fn partial_config_overrides_only_named_tables() {
        let rules: ZoneRules = toml::from_str(
            "version = \"team-3\"\n\n[[imports]]\npattern = \"redis\"\nweight = -4.0\n",
        )
        .unwrap();
        assert_eq!(rules.version, "team-3");
        assert_eq!(rules.imports.len(), 1);
        assert_eq!(rules.imports[0].pattern, "redis");
        // untouched tables keep defaults
        assert_eq!(rules.body.mutation_call, -2.0);
        assert!(!rules.naming.is_empty());
    }
}
