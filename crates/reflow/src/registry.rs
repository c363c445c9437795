//! Construct-level idempotency registry.
//!
//! The single source of truth for "does this construct need (re)processing".
//! The analyzer and classifier re-run unconditionally every invocation; all
//! cost savings come from this registry short-circuiting processing.
//!
//! State is one JSON document per project. Writes are atomic
//! (write-temp-then-rename) and I/O failures are fatal: silently losing
//! state would corrupt every future idempotency decision. Concurrent runs
//! are excluded by an advisory lock file held for the registry's lifetime.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    receipts::{ReceiptStore, TransformationReceipt, unix_now},
    zones::Zone,
};

const REGISTRY_FILE: &str = "registry.json";
const LOCK_FILE: &str = "registry.lock";
const RECEIPTS_DIR: &str = "receipts";
const REGISTRY_VERSION: u32 = 1;

/// Hex-encoded SHA-256 of a construct's exact source span
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructStatus {
    Pending,
    Transformed,
    SkippedClean,
    SkippedIo,
    ManuallyFixed,
    NeedsReview,
}

/// Persisted per-construct state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructState {
    pub content_hash: String,
    pub fp_zone: Zone,
    pub status: ConstructStatus,
    pub last_processed: u64,
    pub applied_transforms: Vec<String>,
    pub anti_patterns: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    version: u32,
    constructs: IndexMap<String, ConstructState>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            constructs: IndexMap::new(),
        }
    }
}

/// Advisory lock file guarding registry read-modify-write cycles.
/// Released on drop; a leftover file from a crashed run must be removed by
/// the operator, which is the advisory part of the contract.
#[derive(Debug)]
#[must_use = "the lock is released when this guard is dropped"]
struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                bail!(
                    "registry lock {} is held by another run (remove it if that run crashed)",
                    path.display()
                )
            }
            Err(e) => Err(e).with_context(|| format!("acquiring lock {}", path.display())),
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// The registry plus its receipt store, rooted in one state directory
#[derive(Debug)]
pub struct ConstructRegistry {
    path: PathBuf,
    doc: RegistryDocument,
    receipts: ReceiptStore,
    _lock: RegistryLock,
}

impl ConstructRegistry {
    /// Open (or create) the registry under `state_dir`, taking the
    /// advisory lock for the lifetime of the returned value.
    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("creating state directory {}", state_dir.display()))?;
        let lock = RegistryLock::acquire(state_dir.join(LOCK_FILE))?;
        let path = state_dir.join(REGISTRY_FILE);
        let doc = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading registry {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing registry {}", path.display()))?
        } else {
            RegistryDocument::default()
        };
        let receipts = ReceiptStore::open(&state_dir.join(RECEIPTS_DIR))?;
        info!(
            "opened registry with {} tracked construct(s)",
            doc.constructs.len()
        );
        Ok(Self {
            path,
            doc,
            receipts,
            _lock: lock,
        })
    }

    /// Decide whether a construct needs (re)processing, updating its state.
    ///
    /// Returns `(process, reason)`. This is the state machine of the
    /// design: first sightings are triaged by zone and anti-patterns;
    /// transformed constructs re-open only when their content changed and
    /// the patterns came back; externally fixed constructs are left alone.
    pub fn should_process(
        &mut self,
        id: &str,
        content_hash: &str,
        zone: Zone,
        anti_patterns: &[String],
    ) -> (bool, String) {
        let now = unix_now();
        let prior = self
            .doc
            .constructs
            .get(id)
            .map(|s| (s.status, s.content_hash == content_hash));
        let decision = match prior {
            None => self.first_sighting(id, content_hash, zone, anti_patterns, now),
            Some((status, unchanged)) => match status {
                ConstructStatus::Transformed | ConstructStatus::ManuallyFixed => {
                    self.revisit_transformed(id, content_hash, zone, anti_patterns, unchanged, now)
                }
                ConstructStatus::SkippedClean | ConstructStatus::SkippedIo => self.revisit_skipped(
                    id,
                    content_hash,
                    zone,
                    anti_patterns,
                    status,
                    unchanged,
                    now,
                ),
                ConstructStatus::Pending | ConstructStatus::NeedsReview => {
                    self.revisit_open(id, content_hash, zone, anti_patterns, status, now)
                }
            },
        };
        debug!("{id}: process={} ({})", decision.0, decision.1);
        decision
    }

    fn first_sighting(
        &mut self,
        id: &str,
        content_hash: &str,
        zone: Zone,
        anti_patterns: &[String],
        now: u64,
    ) -> (bool, String) {
        let (status, process, reason) = if zone == Zone::IoShell {
            (
                ConstructStatus::SkippedIo,
                false,
                "io-shell constructs are not refactored".to_owned(),
            )
        } else if anti_patterns.is_empty() {
            (
                ConstructStatus::SkippedClean,
                false,
                "no anti-patterns detected".to_owned(),
            )
        } else {
            (
                ConstructStatus::Pending,
                true,
                format!("first sighting with {} anti-pattern(s)", anti_patterns.len()),
            )
        };
        self.doc.constructs.insert(
            id.to_owned(),
            ConstructState {
                content_hash: content_hash.to_owned(),
                fp_zone: zone,
                status,
                last_processed: now,
                applied_transforms: Vec::new(),
                anti_patterns: anti_patterns.to_vec(),
            },
        );
        (process, reason)
    }

    fn revisit_transformed(
        &mut self,
        id: &str,
        content_hash: &str,
        zone: Zone,
        anti_patterns: &[String],
        unchanged: bool,
        now: u64,
    ) -> (bool, String) {
        if unchanged {
            return (false, "unchanged since transformation".to_owned());
        }
        if anti_patterns.is_empty() {
            self.update_state(
                id,
                content_hash,
                zone,
                anti_patterns,
                Some(ConstructStatus::ManuallyFixed),
                now,
            );
            (
                false,
                "content changed but no anti-patterns remain".to_owned(),
            )
        } else {
            self.update_state(
                id,
                content_hash,
                zone,
                anti_patterns,
                Some(ConstructStatus::NeedsReview),
                now,
            );
            (
                true,
                "content changed since transformation and anti-patterns reappeared".to_owned(),
            )
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn revisit_skipped(
        &mut self,
        id: &str,
        content_hash: &str,
        zone: Zone,
        anti_patterns: &[String],
        prior_status: ConstructStatus,
        unchanged: bool,
        now: u64,
    ) -> (bool, String) {
        if zone == Zone::IoShell {
            self.update_state(
                id,
                content_hash,
                zone,
                anti_patterns,
                Some(ConstructStatus::SkippedIo),
                now,
            );
            return (false, "io-shell constructs are not refactored".to_owned());
        }
        if unchanged && prior_status == ConstructStatus::SkippedClean {
            return (false, "unchanged and clean".to_owned());
        }
        if anti_patterns.is_empty() {
            self.update_state(
                id,
                content_hash,
                zone,
                anti_patterns,
                Some(ConstructStatus::SkippedClean),
                now,
            );
            (false, "no anti-patterns detected".to_owned())
        } else {
            self.update_state(
                id,
                content_hash,
                zone,
                anti_patterns,
                Some(ConstructStatus::Pending),
                now,
            );
            (true, "anti-patterns found in changed content".to_owned())
        }
    }

    /// A construct still awaiting processing. Re-triage on every sighting:
    /// a marker may have pushed it into io-shell, or an edit may have
    /// cleared its findings before the tool got to it.
    fn revisit_open(
        &mut self,
        id: &str,
        content_hash: &str,
        zone: Zone,
        anti_patterns: &[String],
        prior_status: ConstructStatus,
        now: u64,
    ) -> (bool, String) {
        if zone == Zone::IoShell {
            self.update_state(
                id,
                content_hash,
                zone,
                anti_patterns,
                Some(ConstructStatus::SkippedIo),
                now,
            );
            return (false, "io-shell constructs are not refactored".to_owned());
        }
        if anti_patterns.is_empty() {
            // A needs-review construct had been transformed before; a clean
            // re-scan means someone resolved the regression by hand.
            let resolved = if prior_status == ConstructStatus::NeedsReview {
                ConstructStatus::ManuallyFixed
            } else {
                ConstructStatus::SkippedClean
            };
            self.update_state(id, content_hash, zone, anti_patterns, Some(resolved), now);
            return (false, "no anti-patterns remain".to_owned());
        }
        self.update_state(id, content_hash, zone, anti_patterns, None, now);
        (true, "still awaiting processing".to_owned())
    }

    fn update_state(
        &mut self,
        id: &str,
        content_hash: &str,
        zone: Zone,
        anti_patterns: &[String],
        status: Option<ConstructStatus>,
        now: u64,
    ) {
        if let Some(state) = self.doc.constructs.get_mut(id) {
            state.content_hash = content_hash.to_owned();
            state.fp_zone = zone;
            state.anti_patterns = anti_patterns.to_vec();
            state.last_processed = now;
            if let Some(status) = status {
                state.status = status;
            }
        }
    }

    /// Record a successfully applied transformation: the construct becomes
    /// `transformed` and one receipt is appended. The status invariant
    /// (transformed implies a non-empty transform list) holds by
    /// construction.
    pub fn record_transformation(
        &mut self,
        id: &str,
        transform_type: &str,
        before_text: &str,
        after_text: &str,
        anti_patterns_fixed: Vec<String>,
    ) -> Result<TransformationReceipt> {
        let before_hash = content_hash(before_text);
        let after_hash = content_hash(after_text);
        let receipt = self.receipts.append(
            id,
            transform_type,
            &before_hash,
            &after_hash,
            before_text,
            after_text,
            anti_patterns_fixed.clone(),
        )?;
        let now = unix_now();
        let state = self
            .doc
            .constructs
            .entry(id.to_owned())
            .or_insert_with(|| ConstructState {
                content_hash: after_hash.clone(),
                fp_zone: Zone::Orchestration,
                status: ConstructStatus::Pending,
                last_processed: now,
                applied_transforms: Vec::new(),
                anti_patterns: Vec::new(),
            });
        state.status = ConstructStatus::Transformed;
        state.content_hash = after_hash;
        state.last_processed = now;
        state.applied_transforms.push(transform_type.to_owned());
        state
            .anti_patterns
            .retain(|p| !anti_patterns_fixed.contains(p));
        Ok(receipt)
    }

    pub fn state(&self, id: &str) -> Option<&ConstructState> {
        self.doc.constructs.get(id)
    }

    pub fn len(&self) -> usize {
        self.doc.constructs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.constructs.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = (&String, &ConstructState)> {
        self.doc.constructs.iter()
    }

    pub fn receipts(&self) -> &ReceiptStore {
        &self.receipts
    }

    pub fn receipts_mut(&mut self) -> &mut ReceiptStore {
        &mut self.receipts
    }

    /// Registry entries whose construct no longer exists in the current
    /// analysis. Stale entries are reported, never auto-pruned: they are
    /// audit history.
    pub fn stale_entries<'a>(
        &'a self,
        live_ids: &std::collections::HashSet<String>,
    ) -> Vec<&'a str> {
        self.doc
            .constructs
            .keys()
            .filter(|id| !live_ids.contains(*id))
            .map(String::as_str)
            .collect()
    }

    /// Persist the registry atomically: serialize to a temp file in the
    /// same directory, then rename over the previous document.
    pub fn save(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .with_context(|| format!("registry path {} has no parent", self.path.display()))?;
        let json = serde_json::to_vec_pretty(&self.doc)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp registry in {}", parent.display()))?;
        std::io::Write::write_all(&mut temp, &json)
            .context("writing temp registry")?;
        temp.persist(&self.path)
            .with_context(|| format!("renaming temp registry over {}", self.path.display()))?;
        debug!("saved registry to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn first_sighting_triage() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();

        let (process, _) =
            registry.should_process("a::io", &content_hash("x"), Zone::IoShell, &patterns(&["m"]));
        assert!(!process);
        assert_eq!(
            registry.state("a::io").unwrap().status,
            ConstructStatus::SkippedIo
        );

        let (process, _) =
            registry.should_process("a::clean", &content_hash("y"), Zone::PureCore, &[]);
        assert!(!process);
        assert_eq!(
            registry.state("a::clean").unwrap().status,
            ConstructStatus::SkippedClean
        );

        let (process, reason) = registry.should_process(
            "a::dirty",
            &content_hash("z"),
            Zone::PureCore,
            &patterns(&["mutating call: xs.push"]),
        );
        assert!(process);
        assert!(reason.contains("first sighting"));
        assert_eq!(
            registry.state("a::dirty").unwrap().status,
            ConstructStatus::Pending
        );
    }

    #[test]
    fn transformed_construct_is_skipped_while_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process(
            "a::f",
            &content_hash("before"),
            Zone::PureCore,
            &patterns(&["p"]),
        );
        registry
            .record_transformation("a::f", "immutability", "before", "after", patterns(&["p"]))
            .unwrap();

        let receipt_count = registry.receipts().count().unwrap();
        let (process, reason) =
            registry.should_process("a::f", &content_hash("after"), Zone::PureCore, &[]);
        assert!(!process);
        assert_eq!(reason, "unchanged since transformation");
        // no new receipts on the no-op path
        assert_eq!(registry.receipts().count().unwrap(), receipt_count);
    }

    #[test]
    fn regression_is_detected_when_patterns_reappear() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process(
            "a::f",
            &content_hash("v1"),
            Zone::PureCore,
            &patterns(&["p"]),
        );
        registry
            .record_transformation("a::f", "immutability", "v1", "v2", patterns(&["p"]))
            .unwrap();

        let (process, _) = registry.should_process(
            "a::f",
            &content_hash("v3"),
            Zone::PureCore,
            &patterns(&["p"]),
        );
        assert!(process);
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::NeedsReview
        );
    }

    #[test]
    fn external_fix_is_respected() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process(
            "a::f",
            &content_hash("v1"),
            Zone::PureCore,
            &patterns(&["p"]),
        );
        registry
            .record_transformation("a::f", "immutability", "v1", "v2", patterns(&["p"]))
            .unwrap();

        let (process, _) =
            registry.should_process("a::f", &content_hash("v3-hand-edited"), Zone::PureCore, &[]);
        assert!(!process);
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::ManuallyFixed
        );
    }

    #[test]
    fn clean_construct_reopens_when_patterns_appear() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process("a::f", &content_hash("v1"), Zone::PureCore, &[]);

        let (process, _) = registry.should_process(
            "a::f",
            &content_hash("v2"),
            Zone::PureCore,
            &patterns(&["p"]),
        );
        assert!(process);
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::Pending
        );
    }

    #[test]
    fn pending_construct_cleaned_by_hand_is_closed_out() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process(
            "a::f",
            &content_hash("v1"),
            Zone::PureCore,
            &patterns(&["p"]),
        );

        let (process, _) =
            registry.should_process("a::f", &content_hash("v2"), Zone::PureCore, &[]);
        assert!(!process);
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::SkippedClean
        );
    }

    #[test]
    fn pending_construct_marked_io_stops_being_tracked_for_work() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process(
            "a::f",
            &content_hash("v1"),
            Zone::PureCore,
            &patterns(&["p"]),
        );

        // an @fp-ignore marker lands on the construct between runs
        let (process, _) = registry.should_process(
            "a::f",
            &content_hash("v1-with-marker"),
            Zone::IoShell,
            &patterns(&["p"]),
        );
        assert!(!process);
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::SkippedIo
        );
    }

    #[test]
    fn needs_review_resolved_by_hand_becomes_manually_fixed() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process(
            "a::f",
            &content_hash("v1"),
            Zone::PureCore,
            &patterns(&["p"]),
        );
        registry
            .record_transformation("a::f", "t", "v1", "v2", patterns(&["p"]))
            .unwrap();
        // regression: content changed, patterns back
        registry.should_process(
            "a::f",
            &content_hash("v3"),
            Zone::PureCore,
            &patterns(&["p"]),
        );
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::NeedsReview
        );

        let (process, _) =
            registry.should_process("a::f", &content_hash("v4"), Zone::PureCore, &[]);
        assert!(!process);
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::ManuallyFixed
        );
    }

    #[test]
    fn transformed_implies_applied_transforms() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry
            .record_transformation("a::f", "t", "x", "y", Vec::new())
            .unwrap();
        let state = registry.state("a::f").unwrap();
        assert_eq!(state.status, ConstructStatus::Transformed);
        assert!(!state.applied_transforms.is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let mut registry = ConstructRegistry::open(dir.path()).unwrap();
            registry.should_process(
                "a::f",
                &content_hash("v1"),
                Zone::PureCore,
                &patterns(&["p"]),
            );
            registry.save().unwrap();
        }
        let registry = ConstructRegistry::open(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.state("a::f").unwrap().status,
            ConstructStatus::Pending
        );
    }

    #[test]
    fn lock_excludes_concurrent_open() {
        let dir = TempDir::new().unwrap();
        let first = ConstructRegistry::open(dir.path()).unwrap();
        let second = ConstructRegistry::open(dir.path());
        assert!(second.is_err());
        drop(first);
        // released on drop
        assert!(ConstructRegistry::open(dir.path()).is_ok());
    }

    #[test]
    fn stale_entries_are_reported_not_pruned() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConstructRegistry::open(dir.path()).unwrap();
        registry.should_process("gone::f", &content_hash("v"), Zone::PureCore, &[]);
        registry.should_process("live::f", &content_hash("v"), Zone::PureCore, &[]);

        let live: std::collections::HashSet<String> = ["live::f".to_owned()].into();
        assert_eq!(registry.stale_entries(&live), vec!["gone::f"]);
        assert_eq!(registry.len(), 2);
    }
}
