//! # channel-dl
//!
//! Resumable, rate-limit-aware harvesting of media attachments from a
//! messaging channel's history.
//!
//! ## Design Philosophy
//!
//! channel-dl is designed to be:
//! - **Resumable** - Progress lives in a human-inspectable JSON ledger;
//!   an interrupted run picks up exactly where it stopped
//! - **Rate-limit aware** - Server throttle signals suspend work instead of
//!   burning retry attempts
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Transport-agnostic** - The messaging service is reached through the
//!   [`ChannelClient`] trait supplied by the embedding application
//!
//! ## Quick Start
//!
//! ```no_run
//! use channel_dl::{Config, Pipeline, ChannelClient};
//! use std::sync::Arc;
//!
//! # async fn example(client: Arc<dyn ChannelClient>) -> channel_dl::Result<()> {
//! let config = Config {
//!     output_dir: "./downloads".into(),
//!     limit: Some(100),
//!     ..Default::default()
//! };
//!
//! let summary = Pipeline::new(config, client).run().await?;
//! println!(
//!     "downloaded {} of {} matched messages",
//!     summary.downloaded, summary.matched
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Selection predicates over message records
pub mod classifier;
/// Channel client trait and capabilities
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Rate-limited attachment fetching
pub mod fetcher;
/// Progress ledger persistence
pub mod ledger;
/// Filename sanitization and destination paths
pub mod naming;
/// Run orchestration
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Core domain types
pub mod types;
/// Post-download integrity checking
pub mod verifier;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use client::{Capabilities, ChannelClient};
pub use config::{Config, RetryConfig, SelectionConfig};
pub use error::{Error, Result};
pub use fetcher::Fetcher;
pub use ledger::{Ledger, LedgerEntry};
pub use pipeline::Pipeline;
pub use retry::{Sleeper, TokioSleeper};
pub use types::{
    AttachmentRef, DownloadOutcome, DownloadStatus, FailureDetail, Integrity, MessageId,
    MessageRecord, ReactionSummary, RunSummary, SelectionMode, UserId,
};
pub use verifier::{VerifyResult, VerifySummary};
