//! Download verification
//!
//! Independently re-checks files the ledger records as Verified: the file
//! must exist and its size and SHA-256 must match the integrity record
//! captured at download time. Mismatches downgrade the entry to Failed and
//! clear its path, making it eligible for re-download on the next normal
//! run. Used both as the `verify_only` pass and, through [`integrity_of`],
//! by the fetcher when it completes a download.

use crate::error::Result;
use crate::ledger::Ledger;
use crate::types::{DownloadOutcome, Integrity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Result of re-checking one recorded download
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// File present and matching its integrity record
    Intact,
    /// File missing, truncated, or altered
    Mismatch {
        /// What the check found
        reason: String,
    },
}

/// Counters from a verification pass over the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySummary {
    /// Entries examined
    pub checked: u64,
    /// Entries whose files passed
    pub intact: u64,
    /// Entries downgraded to Failed
    pub failed: u64,
}

/// Compute the integrity record (size and SHA-256) of a file on disk
pub fn integrity_of(path: &Path) -> Result<Integrity> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        hasher.update(&buf[..n]);
    }
    Ok(Integrity {
        size,
        sha256: format!("{:x}", hasher.finalize()),
    })
}

/// Re-check a single recorded outcome against the filesystem
pub fn verify(outcome: &DownloadOutcome) -> VerifyResult {
    let Some(path) = outcome.local_path.as_deref() else {
        return VerifyResult::Mismatch {
            reason: "no local path recorded".to_string(),
        };
    };
    if !path.exists() {
        return VerifyResult::Mismatch {
            reason: format!("file not found: {}", path.display()),
        };
    }
    let Some(expected) = outcome.integrity.as_ref() else {
        // Nothing recorded to compare against; existence is all we can check
        return VerifyResult::Intact;
    };
    let actual = match integrity_of(path) {
        Ok(actual) => actual,
        Err(e) => {
            return VerifyResult::Mismatch {
                reason: format!("could not read {}: {e}", path.display()),
            };
        }
    };
    if actual.size != expected.size {
        return VerifyResult::Mismatch {
            reason: format!(
                "size mismatch for {}: expected {}, got {}",
                path.display(),
                expected.size,
                actual.size
            ),
        };
    }
    if actual.sha256 != expected.sha256 {
        return VerifyResult::Mismatch {
            reason: format!("content hash mismatch for {}", path.display()),
        };
    }
    VerifyResult::Intact
}

/// Verify every ledger entry with status Verified, downgrading mismatches.
///
/// A mismatched file still on disk is removed so a later run cannot confuse
/// it with a good download. Never touches the network.
pub fn verify_all(ledger: &mut Ledger) -> Result<VerifySummary> {
    let mut summary = VerifySummary::default();

    for id in ledger.verified_ids() {
        let Some(outcome) = ledger.entry(id).and_then(|e| e.outcome.clone()) else {
            continue;
        };
        summary.checked += 1;

        match verify(&outcome) {
            VerifyResult::Intact => {
                summary.intact += 1;
                tracing::debug!(message_id = %id, "Verified");
            }
            VerifyResult::Mismatch { reason } => {
                summary.failed += 1;
                tracing::warn!(message_id = %id, reason = %reason, "Verification failed, marking for re-download");
                if let Some(path) = outcome.local_path.as_deref()
                    && path.exists()
                {
                    if let Err(e) = std::fs::remove_file(path) {
                        tracing::warn!(path = %path.display(), error = %e, "Could not remove mismatched file");
                    }
                }
                ledger.downgrade_to_failed(id, reason)?;
            }
        }
    }

    tracing::info!(
        checked = summary.checked,
        intact = summary.intact,
        failed = summary.failed,
        "Verification pass complete"
    );
    Ok(summary)
}
