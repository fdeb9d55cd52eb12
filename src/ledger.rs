//! Durable progress ledger
//!
//! The ledger is the single source of truth for "already done": one entry
//! per examined message, an optional download outcome per media-bearing
//! match, and the scan cursor used to resume. It is persisted as a single
//! human-inspectable JSON document; checkpoints write to a temporary file
//! and rename into place so a crash mid-write never leaves a truncated
//! ledger, and the previous ledger is kept as a `.bak` alongside.
//!
//! The filesystem is never consulted for resumption decisions — a file may
//! exist on disk but be incomplete.

use crate::error::{Error, Result};
use crate::types::{DownloadOutcome, DownloadStatus, MessageId, MessageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Current on-disk format version
pub const LEDGER_VERSION: u32 = 1;

/// One ledger entry: an examined message and its download outcome, if any
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The examined message (immutable once written)
    pub record: MessageRecord,
    /// Download outcome, present only for matched media-bearing messages
    pub outcome: Option<DownloadOutcome>,
}

/// Durable record of scan and download progress
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ledger {
    /// On-disk format version; unknown versions refuse to load
    version: u32,
    /// Selection-mode fingerprint this ledger was written under
    run_mode: String,
    /// Entries keyed by message id
    entries: BTreeMap<MessageId, LedgerEntry>,
    /// High-water mark: largest id confirmed fully processed
    last_processed_id: Option<MessageId>,
    /// Attachments recorded Verified; never decreases
    total_downloaded: u64,
    /// Attachments recorded Failed; never decreases
    total_failed: u64,
    /// When the ledger was last checkpointed
    last_scan_time: Option<DateTime<Utc>>,
}

impl Ledger {
    /// Create an empty ledger for the given run-mode fingerprint
    pub fn new(run_mode: impl Into<String>) -> Self {
        Self {
            version: LEDGER_VERSION,
            run_mode: run_mode.into(),
            entries: BTreeMap::new(),
            last_processed_id: None,
            total_downloaded: 0,
            total_failed: 0,
            last_scan_time: None,
        }
    }

    /// Load a ledger from `path`.
    ///
    /// Returns `Ok(None)` when no ledger exists yet, or when the file is
    /// unparseable (a damaged ledger means starting the scan fresh, logged
    /// as a warning, rather than refusing to run). A ledger with an unknown
    /// format version is an error: guessing at its meaning could skip or
    /// repeat work silently.
    pub fn load(path: &Path) -> Result<Option<Ledger>> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let ledger: Ledger = match serde_json::from_slice(&data) {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid ledger file, starting fresh");
                return Ok(None);
            }
        };
        if ledger.version != LEDGER_VERSION {
            return Err(Error::Ledger(format!(
                "unsupported ledger version {} at {} (expected {})",
                ledger.version,
                path.display(),
                LEDGER_VERSION
            )));
        }
        Ok(Some(ledger))
    }

    /// The selection-mode fingerprint this ledger was written under
    pub fn run_mode(&self) -> &str {
        &self.run_mode
    }

    /// Look up an entry by message id
    pub fn entry(&self, id: MessageId) -> Option<&LedgerEntry> {
        self.entries.get(&id)
    }

    /// Iterate all entries in id order
    pub fn entries(&self) -> impl Iterator<Item = (&MessageId, &LedgerEntry)> {
        self.entries.iter()
    }

    /// Number of recorded messages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no messages have been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an examined message.
    ///
    /// Idempotent: a message already present is left untouched (records are
    /// immutable once written; only the outcome transitions).
    pub fn record(&mut self, record: MessageRecord) {
        self.entries
            .entry(record.message_id)
            .or_insert(LedgerEntry { record, outcome: None });
    }

    /// Update (or create) the download outcome for a recorded message.
    ///
    /// Enforces the legal status order; writing an identical outcome is a
    /// no-op. Counters are bumped exactly once per entry's arrival at
    /// Verified or Failed.
    pub fn update_outcome(&mut self, id: MessageId, outcome: DownloadOutcome) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("message {id} not recorded in ledger")))?;
        if !entry.record.has_media {
            return Err(Error::Ledger(format!(
                "message {id} has no media; refusing to record a download outcome"
            )));
        }
        if entry.outcome.as_ref() == Some(&outcome) {
            return Ok(());
        }
        let prior = entry
            .outcome
            .as_ref()
            .map(|o| o.status)
            .unwrap_or(DownloadStatus::Pending);
        if !prior.can_transition_to(outcome.status) {
            return Err(Error::IllegalTransition {
                id,
                from: prior,
                to: outcome.status,
            });
        }
        if outcome.status == DownloadStatus::Verified && prior != DownloadStatus::Verified {
            self.total_downloaded += 1;
        }
        if outcome.status == DownloadStatus::Failed && prior != DownloadStatus::Failed {
            self.total_failed += 1;
        }
        entry.outcome = Some(outcome);
        Ok(())
    }

    /// Whether the message's attachment is already Verified
    pub fn contains_completed(&self, id: MessageId) -> bool {
        self.entries
            .get(&id)
            .and_then(|e| e.outcome.as_ref())
            .is_some_and(|o| o.status == DownloadStatus::Verified)
    }

    /// Whether the message failed permanently: past the retry ceiling, never
    /// retried again within this ledger
    pub fn is_frozen_failed(&self, id: MessageId, max_attempts: u32) -> bool {
        self.entries
            .get(&id)
            .and_then(|e| e.outcome.as_ref())
            .is_some_and(|o| o.status == DownloadStatus::Failed && o.attempt_count > max_attempts)
    }

    /// Explicit retry reset: Failed -> Pending, allowed only below the retry
    /// ceiling. Returns whether the reset happened.
    pub fn reset_failed(&mut self, id: MessageId, max_attempts: u32) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        let Some(outcome) = entry.outcome.as_mut() else {
            return false;
        };
        if outcome.status != DownloadStatus::Failed || outcome.attempt_count > max_attempts {
            return false;
        }
        outcome.status = DownloadStatus::Pending;
        true
    }

    /// Downgrade a previously Verified entry after a failed integrity check.
    ///
    /// Clears `local_path` so the next normal run re-downloads. This is the
    /// verifier's authority, outside the forward transition order.
    pub fn downgrade_to_failed(&mut self, id: MessageId, reason: impl Into<String>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("message {id} not recorded in ledger")))?;
        let outcome = entry
            .outcome
            .as_mut()
            .ok_or_else(|| Error::NotFound(format!("message {id} has no download outcome")))?;
        if outcome.status != DownloadStatus::Failed {
            self.total_failed += 1;
        }
        outcome.status = DownloadStatus::Failed;
        outcome.local_path = None;
        outcome.last_error = Some(reason.into());
        Ok(())
    }

    /// Message ids with a Verified outcome, in id order
    pub fn verified_ids(&self) -> Vec<MessageId> {
        self.entries
            .iter()
            .filter(|(_, e)| {
                e.outcome
                    .as_ref()
                    .is_some_and(|o| o.status == DownloadStatus::Verified)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Advance the high-water mark; ids never move it backwards
    pub fn note_processed(&mut self, id: MessageId) {
        match self.last_processed_id {
            Some(current) if current >= id => {}
            _ => self.last_processed_id = Some(id),
        }
    }

    /// Largest message id confirmed fully processed
    pub fn last_processed_id(&self) -> Option<MessageId> {
        self.last_processed_id
    }

    /// Attachments recorded Verified so far
    pub fn total_downloaded(&self) -> u64 {
        self.total_downloaded
    }

    /// Attachments recorded Failed so far
    pub fn total_failed(&self) -> u64 {
        self.total_failed
    }

    /// Durably persist the ledger to `path`.
    ///
    /// Writes the full document to `<path>.tmp` and renames it into place,
    /// keeping the previous ledger as `<path>.bak`. A reader never observes
    /// a partially written ledger.
    pub fn checkpoint(&mut self, path: &Path) -> Result<()> {
        self.last_scan_time = Some(Utc::now());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(self)?;
        let tmp = suffixed(path, ".tmp");
        std::fs::write(&tmp, &data)?;

        if path.exists() {
            std::fs::copy(path, suffixed(path, ".bak"))?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!(
            path = %path.display(),
            entries = self.entries.len(),
            downloaded = self.total_downloaded,
            failed = self.total_failed,
            "Ledger checkpointed"
        );
        Ok(())
    }

    /// Remove the ledger file and its backup, if present
    pub fn clear(path: &Path) -> Result<()> {
        for target in [path.to_path_buf(), suffixed(path, ".bak"), suffixed(path, ".tmp")] {
            match std::fs::remove_file(&target) {
                Ok(()) => tracing::info!(path = %target.display(), "Removed ledger file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
