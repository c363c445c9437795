//! Append-only transformation receipts.
//!
//! One JSON document per applied transformation. A receipt is written once
//! and never rewritten; verification flips a flag and stamps a timestamp,
//! which is the only sanctioned mutation.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

const SNIPPET_LIMIT: usize = 240;

/// Immutable audit record of one applied transformation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationReceipt {
    pub id: String,
    pub timestamp: u64,
    pub construct_id: String,
    pub transform_type: String,
    pub before_hash: String,
    pub after_hash: String,
    pub before_snippet: String,
    pub after_snippet: String,
    pub anti_patterns_fixed: Vec<String>,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<u64>,
}

/// Directory-backed receipt store
#[derive(Debug)]
pub struct ReceiptStore {
    dir: PathBuf,
    /// Per-process sequence; keeps ids unique within one second
    seq: u32,
}

impl ReceiptStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating receipt directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            seq: 0,
        })
    }

    /// Build and persist a new receipt. Refuses to overwrite: an existing
    /// file under the generated id is treated as corruption, not replaced.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        construct_id: &str,
        transform_type: &str,
        before_hash: &str,
        after_hash: &str,
        before_snippet: &str,
        after_snippet: &str,
        anti_patterns_fixed: Vec<String>,
    ) -> Result<TransformationReceipt> {
        let timestamp = unix_now();
        self.seq += 1;
        let receipt = TransformationReceipt {
            id: format!("r{timestamp}-{:04}", self.seq),
            timestamp,
            construct_id: construct_id.to_owned(),
            transform_type: transform_type.to_owned(),
            before_hash: before_hash.to_owned(),
            after_hash: after_hash.to_owned(),
            before_snippet: truncate_snippet(before_snippet),
            after_snippet: truncate_snippet(after_snippet),
            anti_patterns_fixed,
            verified: false,
            verified_at: None,
        };
        let path = self.receipt_path(&receipt.id);
        if path.exists() {
            bail!("receipt {} already exists; refusing to overwrite", receipt.id);
        }
        let json = serde_json::to_vec_pretty(&receipt)?;
        fs::write(&path, json)
            .with_context(|| format!("writing receipt {}", path.display()))?;
        Ok(receipt)
    }

    /// Mark a receipt verified. History stays intact: only the flag and
    /// verification timestamp change.
    pub fn mark_verified(&self, receipt_id: &str) -> Result<()> {
        let path = self.receipt_path(receipt_id);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading receipt {}", path.display()))?;
        let mut receipt: TransformationReceipt = serde_json::from_str(&text)
            .with_context(|| format!("parsing receipt {}", path.display()))?;
        receipt.verified = true;
        receipt.verified_at = Some(unix_now());
        fs::write(&path, serde_json::to_vec_pretty(&receipt)?)
            .with_context(|| format!("rewriting receipt {}", path.display()))?;
        Ok(())
    }

    /// All receipts, oldest first
    pub fn load_all(&self) -> Result<Vec<TransformationReceipt>> {
        let mut receipts = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("listing receipts in {}", self.dir.display()))?
        {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = fs::read_to_string(entry.path())?;
            let receipt: TransformationReceipt = serde_json::from_str(&text)
                .with_context(|| format!("parsing receipt {}", entry.path().display()))?;
            receipts.push(receipt);
        }
        receipts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(receipts)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.load_all()?.len())
    }

    fn receipt_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

fn truncate_snippet(text: &str) -> String {
    if text.len() <= SNIPPET_LIMIT {
        return text.to_owned();
    }
    let mut end = SNIPPET_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
