//! Rate-limited attachment fetching
//!
//! Wraps the channel client's download primitive with the retry policy:
//! rate-limit signals suspend for the server-specified wait (or a doubling
//! backoff when the server is silent), transient transport errors retry with
//! exponential backoff and jitter up to the configured ceiling, and anything
//! past the ceiling comes back as a Failed outcome rather than an error —
//! the orchestrator decides what a batch of failures means.
//!
//! Downloads land at a `.part` path and are renamed into place only after
//! the integrity record is captured, so an interrupted download never leaves
//! a file the ledger could mistake for complete.

use crate::client::ChannelClient;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::naming;
use crate::retry::{IsRetryable, Sleeper, add_jitter, backoff_delay, rate_limit_wait};
use crate::types::{
    AttachmentRef, DownloadOutcome, DownloadStatus, Integrity, MessageId, MessageRecord, UserId,
};
use crate::verifier;
use futures::stream::BoxStream;
use std::path::Path;

/// Downloads attachments on behalf of the orchestrator
pub struct Fetcher<'a> {
    client: &'a dyn ChannelClient,
    retry: &'a RetryConfig,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher over the given client and retry policy
    pub fn new(client: &'a dyn ChannelClient, retry: &'a RetryConfig, sleeper: &'a dyn Sleeper) -> Self {
        Self { client, retry, sleeper }
    }

    /// Lazily enumerate channel history after `cursor` (oldest first)
    pub fn history(&self, cursor: Option<MessageId>) -> BoxStream<'static, Result<MessageRecord>> {
        self.client.history(cursor)
    }

    /// Resolve the author of a message, retrying under the same policy as
    /// downloads.
    ///
    /// Rate-limit signals wait without consuming attempts; transient errors
    /// back off up to the ceiling, after which the last error is returned
    /// for the orchestrator to record against the item.
    pub async fn reply_author(&self, id: MessageId) -> Result<Option<UserId>> {
        let mut attempts: u32 = 0;
        let mut rate_limit_hits: u32 = 0;

        loop {
            match self.client.message_author(id).await {
                Ok(author) => return Ok(author),
                Err(Error::RateLimited { retry_after }) => {
                    let wait = rate_limit_wait(self.retry, retry_after, rate_limit_hits);
                    rate_limit_hits += 1;
                    tracing::warn!(
                        message_id = %id,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited during author lookup, waiting before retry"
                    );
                    self.sleeper.sleep(wait).await;
                }
                Err(e) if e.is_retryable() => {
                    attempts += 1;
                    rate_limit_hits = 0;
                    if attempts > self.retry.max_attempts {
                        return Err(e);
                    }
                    let mut delay = backoff_delay(self.retry, attempts - 1);
                    if self.retry.jitter {
                        delay = add_jitter(delay);
                    }
                    tracing::warn!(
                        message_id = %id,
                        attempt = attempts,
                        error = %e,
                        "Author lookup failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Download one attachment to `dest`, retrying under the policy.
    ///
    /// Always returns an outcome; `attempt_count` counts actual download
    /// attempts — rate-limit waits retry the same attempt without counting
    /// it as a failure.
    pub async fn download(
        &self,
        id: MessageId,
        attachment: &AttachmentRef,
        dest: &Path,
    ) -> DownloadOutcome {
        let tmp = naming::part_path(dest);
        let mut attempts: u32 = 0;
        let mut rate_limit_hits: u32 = 0;

        loop {
            match self.client.download(attachment, &tmp).await {
                Ok(()) => {
                    attempts += 1;
                    match self.finalize(&tmp, dest) {
                        Ok(integrity) => {
                            tracing::info!(
                                message_id = %id,
                                attempts = attempts,
                                size = integrity.size,
                                path = %dest.display(),
                                "Downloaded"
                            );
                            return DownloadOutcome {
                                status: DownloadStatus::Verified,
                                local_path: Some(dest.to_path_buf()),
                                attempt_count: attempts,
                                last_error: None,
                                integrity: Some(integrity),
                            };
                        }
                        Err(e) => {
                            tracing::error!(message_id = %id, error = %e, "Could not finalize download");
                            remove_partial(&tmp);
                            return failed(attempts, &e);
                        }
                    }
                }
                Err(Error::RateLimited { retry_after }) => {
                    let wait = rate_limit_wait(self.retry, retry_after, rate_limit_hits);
                    rate_limit_hits += 1;
                    tracing::warn!(
                        message_id = %id,
                        wait_secs = wait.as_secs_f64(),
                        consecutive_hits = rate_limit_hits,
                        "Rate limited, waiting before retry"
                    );
                    self.sleeper.sleep(wait).await;
                }
                Err(e) if e.is_retryable() => {
                    attempts += 1;
                    rate_limit_hits = 0;
                    if attempts > self.retry.max_attempts {
                        tracing::error!(
                            message_id = %id,
                            attempts = attempts,
                            error = %e,
                            "Download failed after all retry attempts exhausted"
                        );
                        remove_partial(&tmp);
                        return failed(attempts, &e);
                    }
                    let mut delay = backoff_delay(self.retry, attempts - 1);
                    if self.retry.jitter {
                        delay = add_jitter(delay);
                    }
                    tracing::warn!(
                        message_id = %id,
                        attempt = attempts,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Download failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(e) => {
                    attempts += 1;
                    tracing::error!(message_id = %id, error = %e, "Download failed with permanent error");
                    remove_partial(&tmp);
                    return failed(attempts, &e);
                }
            }
        }
    }

    /// Capture integrity of the completed temp file and move it into place
    fn finalize(&self, tmp: &Path, dest: &Path) -> Result<Integrity> {
        let integrity = verifier::integrity_of(tmp)?;
        std::fs::rename(tmp, dest)?;
        Ok(integrity)
    }
}

fn failed(attempts: u32, error: &Error) -> DownloadOutcome {
    DownloadOutcome {
        status: DownloadStatus::Failed,
        local_path: None,
        attempt_count: attempts,
        last_error: Some(error.to_string()),
        integrity: None,
    }
}

fn remove_partial(tmp: &Path) {
    if tmp.exists()
        && let Err(e) = std::fs::remove_file(tmp)
    {
        tracing::warn!(path = %tmp.display(), error = %e, "Could not remove partial download");
    }
}
