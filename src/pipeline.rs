//! Run orchestration
//!
//! [`Pipeline`] ties the pieces together: it opens (or refuses) the ledger,
//! probes the client's capabilities against the selected mode, streams the
//! channel history from the resumption cursor, classifies each record, and
//! hands matches to the fetcher. Outcomes land in the ledger, which is
//! checkpointed every `checkpoint_interval` successes and once at the end,
//! so an interrupted run resumes where it left off.
//!
//! Per-item download failures never abort a run; only configuration,
//! capability, and connection errors are fatal.

use crate::classifier;
use crate::client::ChannelClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::ledger::Ledger;
use crate::naming;
use crate::retry::{Sleeper, TokioSleeper};
use crate::types::{DownloadOutcome, DownloadStatus, FailureDetail, RunSummary, SelectionMode};
use crate::verifier;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;

/// Drives a full harvesting run over one channel
pub struct Pipeline {
    config: Config,
    client: Arc<dyn ChannelClient>,
    sleeper: Arc<dyn Sleeper>,
}

impl Pipeline {
    /// Create a pipeline over the given client
    pub fn new(config: Config, client: Arc<dyn ChannelClient>) -> Self {
        Self {
            config,
            client,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper (tests run retry waits without real delays)
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Execute one run to completion.
    ///
    /// In `verify_only` mode the network is never touched: every Verified
    /// ledger entry is re-checked on disk, mismatches are downgraded, and
    /// the summary reports downgrades under `failed` and intact entries
    /// under `skipped`. A subsequent run with `resume_from` set below the
    /// affected ids re-downloads what the verifier downgraded.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;
        let mode = self.config.selection.resolve()?;
        classifier::probe_capabilities(&mode, self.client.capabilities())?;

        let ledger_path = self.config.ledger_path();
        if self.config.clean {
            self.clean_workspace(&ledger_path)?;
        }
        std::fs::create_dir_all(&self.config.output_dir)?;

        let mut ledger = self.open_ledger(&ledger_path, &mode)?;

        if self.config.verify_only {
            return self.verify_run(&mut ledger, &ledger_path);
        }

        let result = self.scan(&mut ledger, &mode, &ledger_path).await;
        if !self.config.dry_run {
            ledger.checkpoint(&ledger_path)?;
        }
        let summary = result?;
        tracing::info!(
            scanned = summary.scanned,
            matched = summary.matched,
            downloaded = summary.downloaded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Run complete"
        );
        Ok(summary)
    }

    /// Stream history from the cursor, classify, and download matches
    async fn scan(
        &self,
        ledger: &mut Ledger,
        mode: &SelectionMode,
        ledger_path: &Path,
    ) -> Result<RunSummary> {
        let fetcher = Fetcher::new(self.client.as_ref(), &self.config.retry, self.sleeper.as_ref());
        let cursor = self
            .config
            .resume_from
            .or_else(|| ledger.last_processed_id());
        let dry_run = self.config.dry_run;
        tracing::info!(
            mode = %mode,
            cursor = ?cursor,
            dry_run = dry_run,
            "Scanning channel history"
        );

        let mut stream = fetcher.history(cursor);
        let mut summary = RunSummary::default();
        let mut since_checkpoint: u64 = 0;

        while let Some(item) = stream.next().await {
            let record = item?;
            let id = record.message_id;

            // guard against a misbehaving stream re-yielding settled ids
            if cursor.is_some_and(|c| id <= c) {
                continue;
            }
            summary.scanned += 1;

            if ledger.contains_completed(id) {
                tracing::debug!(message_id = %id, "Already downloaded, skipping");
                summary.skipped += 1;
                if !dry_run {
                    ledger.note_processed(id);
                }
                continue;
            }
            if ledger.is_frozen_failed(id, self.config.retry.max_attempts) {
                tracing::debug!(message_id = %id, "Failed permanently in a prior run, skipping");
                summary.skipped += 1;
                if !dry_run {
                    ledger.note_processed(id);
                }
                continue;
            }

            // only media-bearing records can match, so only they need the lookup
            let reply_author = match record.reply_target_id {
                Some(target) if record.has_media && classifier::needs_reply_lookup(mode) => {
                    match fetcher.reply_author(target).await {
                        Ok(author) => author,
                        Err(e) => {
                            tracing::warn!(
                                message_id = %id,
                                reply_target = %target,
                                error = %e,
                                "Reply-author lookup failed, recording and moving on"
                            );
                            summary.failed += 1;
                            summary.failures.push(FailureDetail {
                                message_id: id,
                                error: e.to_string(),
                                attempts: 0,
                            });
                            if !dry_run {
                                ledger.record(record.clone());
                                ledger.reset_failed(id, self.config.retry.max_attempts);
                                let mut marker = ledger
                                    .entry(id)
                                    .and_then(|entry| entry.outcome.clone())
                                    .unwrap_or_else(DownloadOutcome::pending);
                                marker.status = DownloadStatus::InProgress;
                                ledger.update_outcome(id, marker)?;
                                ledger.update_outcome(
                                    id,
                                    DownloadOutcome {
                                        status: DownloadStatus::Failed,
                                        local_path: None,
                                        attempt_count: 0,
                                        last_error: Some(e.to_string()),
                                        integrity: None,
                                    },
                                )?;
                                ledger.note_processed(id);
                            }
                            continue;
                        }
                    }
                }
                _ => None,
            };

            if !dry_run {
                ledger.record(record.clone());
            }

            if !classifier::matches(&record, mode, reply_author) {
                if !dry_run {
                    ledger.note_processed(id);
                }
                continue;
            }
            summary.matched += 1;

            if dry_run {
                tracing::info!(
                    message_id = %id,
                    reactions = record.reaction_count(),
                    "Would download"
                );
                continue;
            }

            let Some(attachment) = record.attachment.clone() else {
                // has_media without an attachment handle is a client bug
                tracing::warn!(message_id = %id, "Matched record carries no attachment, skipping");
                ledger.note_processed(id);
                continue;
            };

            // a Failed entry below the retry ceiling becomes eligible again
            ledger.reset_failed(id, self.config.retry.max_attempts);
            let mut marker = ledger
                .entry(id)
                .and_then(|e| e.outcome.clone())
                .unwrap_or_else(DownloadOutcome::pending);
            marker.status = DownloadStatus::InProgress;
            ledger.update_outcome(id, marker)?;

            let dest = naming::dest_path(&self.config.output_dir, &record);
            let outcome = fetcher.download(id, &attachment, &dest).await;
            match outcome.status {
                DownloadStatus::Verified => {
                    summary.downloaded += 1;
                    since_checkpoint += 1;
                }
                DownloadStatus::Failed => {
                    summary.failed += 1;
                    summary.failures.push(FailureDetail {
                        message_id: id,
                        error: outcome
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "unknown error".to_string()),
                        attempts: outcome.attempt_count,
                    });
                }
                _ => {}
            }
            ledger.update_outcome(id, outcome)?;
            ledger.note_processed(id);

            if since_checkpoint >= self.config.checkpoint_interval {
                ledger.checkpoint(ledger_path)?;
                since_checkpoint = 0;
            }
            if self.config.limit.is_some_and(|l| summary.downloaded >= l) {
                tracing::info!(limit = summary.downloaded, "Download limit reached, stopping");
                break;
            }
        }
        Ok(summary)
    }

    /// Re-check every Verified entry on disk without touching the network
    fn verify_run(&self, ledger: &mut Ledger, ledger_path: &Path) -> Result<RunSummary> {
        let verified = verifier::verify_all(ledger)?;
        ledger.checkpoint(ledger_path)?;
        Ok(RunSummary {
            scanned: verified.checked,
            matched: verified.checked,
            downloaded: 0,
            failed: verified.failed,
            skipped: verified.intact,
            failures: Vec::new(),
        })
    }

    /// Open the ledger for this run, or refuse it.
    ///
    /// A ledger written under a different selection mode is incompatible:
    /// its completion state answers a different question. `force_redownload`
    /// starts a fresh ledger either way, which is what makes re-downloading
    /// already-completed attachments legal under the status order.
    fn open_ledger(&self, path: &Path, mode: &SelectionMode) -> Result<Ledger> {
        let fingerprint = mode.fingerprint();
        if self.config.force_redownload {
            tracing::warn!(mode = %fingerprint, "force_redownload set, starting a fresh ledger");
            return Ok(Ledger::new(fingerprint));
        }
        match Ledger::load(path)? {
            Some(ledger) if ledger.run_mode() == fingerprint => {
                tracing::info!(
                    entries = ledger.len(),
                    cursor = ?ledger.last_processed_id(),
                    "Resuming from existing ledger"
                );
                Ok(ledger)
            }
            Some(ledger) => Err(Error::LedgerIncompatible {
                path: path.to_path_buf(),
                expected: fingerprint,
                found: ledger.run_mode().to_string(),
            }),
            None => Ok(Ledger::new(fingerprint)),
        }
    }

    /// Discard the ledger and every downloaded file before starting over
    fn clean_workspace(&self, ledger_path: &Path) -> Result<()> {
        Ledger::clear(ledger_path)?;
        if self.config.output_dir.exists() {
            tracing::info!(dir = %self.config.output_dir.display(), "Cleaning output directory");
            std::fs::remove_dir_all(&self.config.output_dir)?;
        }
        Ok(())
    }
}
