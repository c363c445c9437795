//! Zone classification: infer a construct's purity class from signals.
//!
//! Priority order, each stage terminating early if it fires:
//! 1. marker annotation in the leading comment (confidence 1.0, no
//!    heuristics run): the escape hatch for cases heuristics get wrong;
//! 2. heuristic signal accumulation (imports, naming, body facts);
//! 3. directory hints, consulted only when no heuristic signal fired.
//!
//! Classification is a pure function of the construct view and the rule
//! configuration; idempotency across runs is the registry's job.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::{config::ZoneRules, semantic::ImportedSymbol, visitors::BodyFacts};

/// Purity class describing expected side-effect discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Zone {
    PureCore,
    Orchestration,
    EffectBoundary,
    IoShell,
}

impl Zone {
    /// Only io-shell constructs are left alone by the refactoring loop
    pub fn should_refactor(self) -> bool {
        self != Self::IoShell
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PureCore => write!(f, "pure-core"),
            Self::Orchestration => write!(f, "orchestration"),
            Self::EffectBoundary => write!(f, "effect-boundary"),
            Self::IoShell => write!(f, "io-shell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalPolarity {
    Positive,
    Negative,
}

/// One matched rule and its contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSignal {
    pub polarity: SignalPolarity,
    pub name: String,
    pub weight: f64,
    pub detail: String,
}

/// Classification of one construct, created fresh each run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpClassification {
    pub zone: Zone,
    pub confidence: f64,
    pub signals: Vec<ClassificationSignal>,
    /// Purity score on a 0..=100 scale derived from the signal ratio
    pub recommended_purity: u8,
    pub warnings: Vec<String>,
    pub should_refactor: bool,
}

/// Everything the classifier may look at for one construct
#[derive(Debug)]
pub struct ConstructView<'a> {
    pub name: &'a str,
    pub file_path: &'a Path,
    pub imports: &'a [ImportedSymbol],
    pub leading_comment: Option<&'a str>,
    pub facts: &'a BodyFacts,
}

/// Classify one construct against a rule configuration.
pub fn classify(view: &ConstructView<'_>, rules: &ZoneRules) -> FpClassification {
    if let Some(classification) = marker_override(view, rules) {
        return classification;
    }

    let mut signals = heuristic_signals(view, rules);

    // Directory hints are the weakest evidence: they only speak when every
    // heuristic stayed silent.
    if signals.is_empty() {
        signals = directory_signals(view.file_path, rules);
    }

    if signals.is_empty() {
        return FpClassification {
            zone: Zone::Orchestration,
            confidence: 0.5,
            signals,
            recommended_purity: 50,
            warnings: vec![format!(
                "no classification signals for '{}'; defaulting to orchestration",
                view.name
            )],
            should_refactor: Zone::Orchestration.should_refactor(),
        };
    }

    let positive: f64 = signals
        .iter()
        .filter(|s| s.polarity == SignalPolarity::Positive)
        .map(|s| s.weight)
        .sum();
    let negative: f64 = signals
        .iter()
        .filter(|s| s.polarity == SignalPolarity::Negative)
        .map(|s| s.weight)
        .sum();
    let total = positive + negative;
    if total == 0.0 {
        // all matched rules carry zero weight; same as no signal
        return FpClassification {
            zone: Zone::Orchestration,
            confidence: 0.5,
            signals,
            recommended_purity: 50,
            warnings: vec![format!(
                "signals for '{}' carry no weight; defaulting to orchestration",
                view.name
            )],
            should_refactor: Zone::Orchestration.should_refactor(),
        };
    }
    let ratio = positive / total;

    let zone = if ratio >= 0.8 {
        Zone::PureCore
    } else if ratio >= 0.6 {
        Zone::Orchestration
    } else if ratio >= 0.4 {
        Zone::EffectBoundary
    } else {
        Zone::IoShell
    };

    FpClassification {
        zone,
        confidence: ratio.max(1.0 - ratio),
        signals,
        recommended_purity: (ratio * 100.0).round() as u8,
        warnings: Vec::new(),
        should_refactor: zone.should_refactor(),
    }
}

/// Marker annotations win outright and skip all heuristics. `@fp-ignore`
/// maps to io-shell, the one zone the refactoring loop never touches.
fn marker_override(view: &ConstructView<'_>, rules: &ZoneRules) -> Option<FpClassification> {
    let comment = view.leading_comment?;
    let markers = &rules.markers;
    let (zone, marker) = if comment.contains(markers.ignore.as_str()) {
        (Zone::IoShell, &markers.ignore)
    } else if comment.contains(markers.pure.as_str()) {
        (Zone::PureCore, &markers.pure)
    } else if comment.contains(markers.io.as_str()) {
        (Zone::IoShell, &markers.io)
    } else if comment.contains(markers.effect_boundary.as_str()) {
        (Zone::EffectBoundary, &markers.effect_boundary)
    } else if comment.contains(markers.orchestration.as_str()) {
        (Zone::Orchestration, &markers.orchestration)
    } else {
        return None;
    };
    let polarity = if zone == Zone::PureCore {
        SignalPolarity::Positive
    } else {
        SignalPolarity::Negative
    };
    // Purity pinned to each zone's threshold floor
    let recommended_purity = match zone {
        Zone::PureCore => 100,
        Zone::Orchestration => 60,
        Zone::EffectBoundary => 40,
        Zone::IoShell => 0,
    };
    Some(FpClassification {
        zone,
        confidence: 1.0,
        signals: vec![ClassificationSignal {
            polarity,
            name: "marker".to_owned(),
            weight: 1.0,
            detail: format!("explicit {marker} annotation"),
        }],
        recommended_purity,
        warnings: Vec::new(),
        should_refactor: zone.should_refactor(),
    })
}

fn heuristic_signals(view: &ConstructView<'_>, rules: &ZoneRules) -> Vec<ClassificationSignal> {
    let mut signals = Vec::new();

    for rule in &rules.imports {
        let matched = view
            .imports
            .iter()
            .find(|i| i.source_module.contains(rule.pattern.as_str()));
        if let Some(import) = matched {
            signals.push(signal(
                "import",
                rule.weight,
                format!("imports '{}' (matches '{}')", import.source_module, rule.pattern),
            ));
        }
    }

    for rule in &rules.naming {
        if view.name.starts_with(rule.prefix.as_str()) {
            signals.push(signal(
                "naming",
                rule.weight,
                format!("name '{}' starts with '{}'", view.name, rule.prefix),
            ));
        }
    }

    let body = &rules.body;
    if !view.facts.mutation_calls.is_empty() {
        signals.push(signal(
            "body:mutation",
            body.mutation_call,
            format!("mutating calls: {}", view.facts.mutation_calls.join(", ")),
        ));
    }
    if view.facts.reassignments > 0 {
        signals.push(signal(
            "body:reassignment",
            body.reassignment,
            format!("{} reassignment(s)", view.facts.reassignments),
        ));
    }
    if view.facts.uses_this {
        signals.push(signal("body:this", body.this_usage, "uses `this`".to_owned()));
    }
    if !view.facts.hook_calls.is_empty() {
        signals.push(signal(
            "body:hooks",
            body.hook_usage,
            format!("hook calls: {}", view.facts.hook_calls.join(", ")),
        ));
    }
    if view.facts.imperative_loops > 0 {
        signals.push(signal(
            "body:loops",
            body.imperative_loop,
            format!("{} imperative loop(s)", view.facts.imperative_loops),
        ));
    }

    signals
}

fn directory_signals(path: &Path, rules: &ZoneRules) -> Vec<ClassificationSignal> {
    let mut signals = Vec::new();
    for hint in &rules.directories {
        let matched = path
            .components()
            .any(|c| c.as_os_str().to_string_lossy() == hint.fragment.as_str());
        if matched {
            signals.push(signal(
                "directory",
                hint.weight,
                format!("path contains '{}'", hint.fragment),
            ));
        }
    }
    signals
}

fn signal(name: &str, weight: f64, detail: String) -> ClassificationSignal {
    ClassificationSignal {
        polarity: if weight >= 0.0 {
            SignalPolarity::Positive
        } else {
            SignalPolarity::Negative
        },
        name: name.to_owned(),
        weight: weight.abs(),
        detail,
    }
}
