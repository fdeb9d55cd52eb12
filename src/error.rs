//! Error types for channel-dl
//!
//! Two classes of failure are distinguished throughout the crate:
//! configuration-level errors (incompatible ledger, missing client
//! capability) which are fatal to the run, and per-item download errors
//! which are recorded in the ledger and surfaced only in the summary.

use crate::types::{DownloadStatus, MessageId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for channel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for channel-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "checkpoint_interval")
        key: Option<String>,
    },

    /// Existing ledger was written under a different selection mode
    #[error(
        "ledger at {path} was written for mode '{found}' but '{expected}' was requested; \
         pass force_redownload or clean to discard it"
    )]
    LedgerIncompatible {
        /// Path of the offending ledger file
        path: PathBuf,
        /// Fingerprint of the requested selection mode
        expected: String,
        /// Fingerprint recorded in the ledger
        found: String,
    },

    /// The selected mode needs data the channel client cannot provide
    #[error("selection mode '{mode}' requires {missing}, which this channel client does not expose")]
    CapabilityUnavailable {
        /// Display form of the requested selection mode
        mode: String,
        /// The missing capability, named for the error message
        missing: &'static str,
    },

    /// Ledger state error (unknown format version, malformed cursor, ...)
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Outcome update that does not follow the legal status order
    #[error("illegal status transition for message {id}: {from} -> {to}")]
    IllegalTransition {
        /// The message whose outcome was being updated
        id: MessageId,
        /// Status currently recorded
        from: DownloadStatus,
        /// Status the update attempted to set
        to: DownloadStatus,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transient transport error from the channel client (retryable)
    #[error("transport error: {0}")]
    Transport(String),

    /// Rate-limit signal from the remote service
    ///
    /// Carries the server-specified wait when the service provides one;
    /// otherwise the fetcher falls back to its own doubling backoff.
    #[error("rate limited by remote service")]
    RateLimited {
        /// Server-specified wait before the next attempt, if given
        retry_after: Option<Duration>,
    },

    /// Download gave up after exhausting its retries
    #[error("download for message {id} failed after {attempts} attempts: {reason}")]
    Download {
        /// The message whose attachment could not be downloaded
        id: MessageId,
        /// Attempts made before giving up
        attempts: u32,
        /// Error text from the last attempt
        reason: String,
    },

    /// Referenced message or entry does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] without a key
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Shorthand for a [`Error::Config`] tied to a specific setting
    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error is fatal to the whole run (as opposed to one item)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::LedgerIncompatible { .. }
                | Error::CapabilityUnavailable { .. }
                | Error::Ledger(_)
        )
    }
}
