//! Execution planning: order externally authored edit chunks.
//!
//! Chunks are partitioned into three phase buckets in fixed order
//! (SCAFFOLD, MIGRATE, CLEANUP); each bucket is topologically sorted over
//! the dependencies declared within it. A dependency on an *earlier* phase
//! is satisfied by construction; one on a *later* phase is a declared-order
//! violation and is reported, never silently reordered. Ties break by
//! input order, so the plan is deterministic given deterministic input.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dep_graph::SemanticContext;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkCategory {
    Scaffold,
    Migrate,
    Cleanup,
}

impl ChunkCategory {
    const ORDERED: [Self; 3] = [Self::Scaffold, Self::Migrate, Self::Cleanup];
}

impl fmt::Display for ChunkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scaffold => write!(f, "SCAFFOLD"),
            Self::Migrate => write!(f, "MIGRATE"),
            Self::Cleanup => write!(f, "CLEANUP"),
        }
    }
}

/// One externally authored edit unit. Read-only input to the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkData {
    pub id: String,
    pub category: ChunkCategory,
    #[serde(default)]
    pub depends_on: IndexSet<String>,
    #[serde(default)]
    pub creates_exports: IndexSet<String>,
    #[serde(default)]
    pub requires_imports: IndexSet<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("duplicate chunk id '{id}'")]
    DuplicateId { id: String },

    #[error("chunk '{chunk}' depends on unknown chunk id '{dependency}'")]
    UnknownDependency { chunk: String, dependency: String },

    #[error(
        "chunk '{chunk}' ({chunk_category}) depends on '{dependency}' in the later \
         {dependency_category} phase"
    )]
    PhaseOrderViolation {
        chunk: String,
        chunk_category: ChunkCategory,
        dependency: String,
        dependency_category: ChunkCategory,
    },

    #[error("dependency cycle within {category} phase: {}", .path.join(" -> "))]
    Cycle {
        category: ChunkCategory,
        path: Vec<String>,
    },
}

/// Compute a total execution order for `chunks`, or the first structural
/// error that makes the input unplannable.
pub fn plan(chunks: &[ChunkData]) -> Result<Vec<ChunkData>, PlanError> {
    let mut categories: IndexMap<&str, ChunkCategory> = IndexMap::new();
    for chunk in chunks {
        if categories
            .insert(chunk.id.as_str(), chunk.category)
            .is_some()
        {
            return Err(PlanError::DuplicateId {
                id: chunk.id.clone(),
            });
        }
    }

    for chunk in chunks {
        for dependency in &chunk.depends_on {
            let Some(&dep_category) = categories.get(dependency.as_str()) else {
                return Err(PlanError::UnknownDependency {
                    chunk: chunk.id.clone(),
                    dependency: dependency.clone(),
                });
            };
            if dep_category > chunk.category {
                return Err(PlanError::PhaseOrderViolation {
                    chunk: chunk.id.clone(),
                    chunk_category: chunk.category,
                    dependency: dependency.clone(),
                    dependency_category: dep_category,
                });
            }
        }
    }

    let mut ordered = Vec::with_capacity(chunks.len());
    for category in ChunkCategory::ORDERED {
        let bucket: Vec<&ChunkData> = chunks.iter().filter(|c| c.category == category).collect();
        ordered.extend(sort_bucket(&bucket, category)?.into_iter().cloned());
    }
    Ok(ordered)
}

/// Kahn's algorithm over one bucket, restricted to in-bucket dependencies.
/// Stable: among ready chunks, the earliest in input order is emitted
/// first.
fn sort_bucket<'a>(
    bucket: &[&'a ChunkData],
    category: ChunkCategory,
) -> Result<Vec<&'a ChunkData>, PlanError> {
    let positions: IndexMap<&str, usize> = bucket
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    // indegree counts only dependencies inside this bucket
    let mut indegree = vec![0_usize; bucket.len()];
    for (i, chunk) in bucket.iter().enumerate() {
        for dependency in &chunk.depends_on {
            if positions.contains_key(dependency.as_str()) {
                indegree[i] += 1;
            }
        }
    }

    let mut emitted = vec![false; bucket.len()];
    let mut ordered = Vec::with_capacity(bucket.len());
    while ordered.len() < bucket.len() {
        let next = (0..bucket.len()).find(|&i| !emitted[i] && indegree[i] == 0);
        let Some(next) = next else {
            return Err(PlanError::Cycle {
                category,
                path: find_cycle_path(bucket, &positions, &emitted),
            });
        };
        emitted[next] = true;
        ordered.push(bucket[next]);
        let emitted_id = bucket[next].id.as_str();
        for (i, chunk) in bucket.iter().enumerate() {
            if !emitted[i] && chunk.depends_on.contains(emitted_id) {
                indegree[i] -= 1;
            }
        }
    }
    Ok(ordered)
}

/// Walk the remaining (un-emitted) chunks until a back edge closes a cycle,
/// and return the full path including the repeated id.
fn find_cycle_path(
    bucket: &[&ChunkData],
    positions: &IndexMap<&str, usize>,
    emitted: &[bool],
) -> Vec<String> {
    let Some(start) = (0..bucket.len()).find(|&i| !emitted[i]) else {
        return Vec::new();
    };
    let mut path: Vec<usize> = vec![start];
    let mut on_path = vec![false; bucket.len()];
    on_path[start] = true;
    loop {
        let current = *path.last().unwrap_or(&start);
        let next = bucket[current]
            .depends_on
            .iter()
            .filter_map(|d| positions.get(d.as_str()).copied())
            .find(|&i| !emitted[i]);
        let Some(next) = next else {
            // Dead end; every un-emitted chunk sits on or feeds a cycle, so
            // this cannot happen, but return what we have rather than loop.
            return path.iter().map(|&i| bucket[i].id.clone()).collect();
        };
        if on_path[next] {
            let cycle_start = path.iter().position(|&i| i == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[cycle_start..]
                .iter()
                .map(|&i| bucket[i].id.clone())
                .collect();
            cycle.push(bucket[next].id.clone());
            return cycle;
        }
        on_path[next] = true;
        path.push(next);
    }
}

/// Check symbol-level feasibility of an ordered plan against the analyzed
/// tree: every required import must either already exist in the project or
/// be created by an earlier chunk. Returns warnings, not errors: the
/// authoring agent may reference symbols outside the analyzed root.
pub fn unsatisfied_requirements(plan: &[ChunkData], context: &SemanticContext) -> Vec<String> {
    let mut available: IndexSet<&str> = context
        .symbol_index()
        .keys()
        .map(String::as_str)
        .collect();
    let mut warnings = Vec::new();
    for chunk in plan {
        for required in &chunk.requires_imports {
            if !available.contains(required.as_str()) {
                warnings.push(format!(
                    "chunk '{}' requires symbol '{required}' which neither exists nor is created \
                     by an earlier chunk",
                    chunk.id
                ));
            }
        }
        for created in &chunk.creates_exports {
            available.insert(created.as_str());
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, category: ChunkCategory, deps: &[&str]) -> ChunkData {
        ChunkData {
            id: id.to_owned(),
            category,
            depends_on: deps.iter().map(|s| (*s).to_owned()).collect(),
            creates_exports: IndexSet::new(),
            requires_imports: IndexSet::new(),
        }
    }

    fn ids(plan: &[ChunkData]) -> Vec<&str> {
        plan.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn categories_are_planned_in_fixed_order() {
        let chunks = vec![
            chunk("cleanup", ChunkCategory::Cleanup, &[]),
            chunk("migrate", ChunkCategory::Migrate, &[]),
            chunk("scaffold", ChunkCategory::Scaffold, &[]),
        ];
        let plan = plan(&chunks).unwrap();
        assert_eq!(ids(&plan), vec!["scaffold", "migrate", "cleanup"]);
    }

    #[test]
    fn cross_phase_dependency_on_earlier_phase_is_satisfied() {
        let chunks = vec![
            chunk("1", ChunkCategory::Scaffold, &[]),
            chunk("3", ChunkCategory::Migrate, &["1"]),
        ];
        let plan = plan(&chunks).unwrap();
        let order = ids(&plan);
        assert!(
            order.iter().position(|&id| id == "1") < order.iter().position(|&id| id == "3")
        );
    }

    #[test]
    fn in_bucket_dependencies_are_respected() {
        let chunks = vec![
            chunk("b", ChunkCategory::Migrate, &["a"]),
            chunk("a", ChunkCategory::Migrate, &[]),
            chunk("c", ChunkCategory::Migrate, &["b"]),
        ];
        let plan = plan(&chunks).unwrap();
        assert_eq!(ids(&plan), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_break_by_input_order_not_id() {
        let chunks = vec![
            chunk("zebra", ChunkCategory::Migrate, &[]),
            chunk("alpha", ChunkCategory::Migrate, &[]),
        ];
        let plan = plan(&chunks).unwrap();
        assert_eq!(ids(&plan), vec!["zebra", "alpha"]);
    }

    #[test]
    fn cycle_is_reported_with_the_full_path() {
        let chunks = vec![
            chunk("1", ChunkCategory::Migrate, &["2"]),
            chunk("2", ChunkCategory::Migrate, &["1"]),
        ];
        let error = plan(&chunks).unwrap_err();
        match &error {
            PlanError::Cycle { category, path } => {
                assert_eq!(*category, ChunkCategory::Migrate);
                assert!(path.contains(&"1".to_owned()));
                assert!(path.contains(&"2".to_owned()));
                // path closes on itself
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert!(error.to_string().contains(" -> "));
    }

    #[test]
    fn phase_order_violation_is_an_error_not_a_reorder() {
        let chunks = vec![
            chunk("early", ChunkCategory::Scaffold, &["late"]),
            chunk("late", ChunkCategory::Migrate, &[]),
        ];
        let error = plan(&chunks).unwrap_err();
        assert_eq!(
            error,
            PlanError::PhaseOrderViolation {
                chunk: "early".to_owned(),
                chunk_category: ChunkCategory::Scaffold,
                dependency: "late".to_owned(),
                dependency_category: ChunkCategory::Migrate,
            }
        );
    }

    #[test]
    fn unknown_dependency_is_unsatisfiable() {
        let chunks = vec![chunk("a", ChunkCategory::Scaffold, &["ghost"])];
        assert_eq!(
            plan(&chunks).unwrap_err(),
            PlanError::UnknownDependency {
                chunk: "a".to_owned(),
                dependency: "ghost".to_owned(),
            }
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let chunks = vec![
            chunk("a", ChunkCategory::Scaffold, &[]),
            chunk("a", ChunkCategory::Cleanup, &[]),
        ];
        assert_eq!(
            plan(&chunks).unwrap_err(),
            PlanError::DuplicateId { id: "a".to_owned() }
        );
    }

    #[test]
    fn requirements_satisfied_by_earlier_chunk_exports() {
        let context = SemanticContext::from_analyses(Vec::new());
        let mut first = chunk("first", ChunkCategory::Scaffold, &[]);
        first.creates_exports.insert("NewApi".to_owned());
        let mut second = chunk("second", ChunkCategory::Migrate, &[]);
        second.requires_imports.insert("NewApi".to_owned());
        let ordered = plan(&[first, second]).unwrap();
        assert!(unsatisfied_requirements(&ordered, &context).is_empty());
    }

    #[test]
    fn missing_requirement_warns() {
        let context = SemanticContext::from_analyses(Vec::new());
        let mut only = chunk("only", ChunkCategory::Migrate, &[]);
        only.requires_imports.insert("Missing".to_owned());
        let warnings = unsatisfied_requirements(&[only], &context);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Missing"));
    }
}
