//! Configuration types for channel-dl

use crate::error::{Error, Result};
use crate::types::{MessageId, SelectionMode, UserId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which messages qualify for download
///
/// The surrounding application fills this from its CLI/env surface; the
/// pipeline resolves it to exactly one [`SelectionMode`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Disable the default any-reaction mode
    #[serde(default)]
    pub skip_all_reactions: bool,

    /// Target user for the replied-to / reacted-by modes
    #[serde(default)]
    pub target_user: Option<UserId>,

    /// Select messages replying to content authored by the target user
    #[serde(default)]
    pub replied_to: bool,

    /// Select messages the target user reacted to
    #[serde(default)]
    pub reacted_by: bool,
}

impl SelectionConfig {
    /// Resolve the configured flags to a single selection mode.
    ///
    /// Target-user modes take precedence over the any-reaction default.
    /// Ambiguous or empty configurations are errors rather than guesses.
    pub fn resolve(&self) -> Result<SelectionMode> {
        if self.replied_to && self.reacted_by {
            return Err(Error::config_key(
                "replied_to and reacted_by are mutually exclusive",
                "selection",
            ));
        }
        if self.replied_to || self.reacted_by {
            let user = self.target_user.ok_or_else(|| {
                Error::config_key(
                    "replied_to/reacted_by require a target_user",
                    "target_user",
                )
            })?;
            return Ok(if self.replied_to {
                SelectionMode::RepliedToUser { user }
            } else {
                SelectionMode::ReactedByUser { user }
            });
        }
        if self.skip_all_reactions {
            return Err(Error::config_key(
                "skip_all_reactions is set and no target-user mode is enabled; nothing to select",
                "selection",
            ));
        }
        Ok(SelectionMode::AnyReaction)
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts per download (default: 3)
    ///
    /// A download is attempted at most `max_attempts + 1` times before it is
    /// recorded as failed. Rate-limit waits do not consume attempts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Cap on a single rate-limit wait, server-specified or not
    /// (default: 900 seconds)
    #[serde(default = "default_max_rate_limit_wait", with = "duration_serde")]
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            max_rate_limit_wait: default_max_rate_limit_wait(),
        }
    }
}

/// Main configuration for a harvesting run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root for downloaded files and the ledger (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Explicit ledger path; defaults to `<output_dir>/ledger.json`
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,

    /// Cap on total downloads this run (None = unlimited)
    #[serde(default)]
    pub limit: Option<u64>,

    /// Ignore completion status in the ledger and re-download everything
    #[serde(default)]
    pub force_redownload: bool,

    /// Discard the ledger and downloaded files before starting
    #[serde(default)]
    pub clean: bool,

    /// Override the scan cursor instead of resuming from the ledger's
    /// high-water mark (manual recovery)
    #[serde(default)]
    pub resume_from: Option<MessageId>,

    /// Successful downloads between durable ledger saves (default: 10)
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Run the verifier over recorded downloads instead of the download path
    #[serde(default)]
    pub verify_only: bool,

    /// Scan and classify without downloading or mutating outcomes
    #[serde(default)]
    pub dry_run: bool,

    /// Selection criteria
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ledger_path: None,
            limit: None,
            force_redownload: false,
            clean: false,
            resume_from: None,
            checkpoint_interval: default_checkpoint_interval(),
            verify_only: false,
            dry_run: false,
            selection: SelectionConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Effective ledger path
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("ledger.json"))
    }

    /// Validate settings that have no sensible fallback
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_interval == 0 {
            return Err(Error::config_key(
                "checkpoint_interval must be at least 1",
                "checkpoint_interval",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config_key(
                "backoff_multiplier must be >= 1.0",
                "retry.backoff_multiplier",
            ));
        }
        self.selection.resolve().map(|_| ())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_checkpoint_interval() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_rate_limit_wait() -> Duration {
    Duration::from_secs(900)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (serialize as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
