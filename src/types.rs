//! Core types for channel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a message within a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Create a new MessageId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<MessageId> for i64 {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Unique identifier for a user (sender or reactor)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Create a new UserId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reaction kind on a message, with its count
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    /// The reaction emoji as sent by the service
    pub emoji: String,
    /// How many users applied this reaction
    pub count: u32,
}

/// Opaque reference to a message's media attachment
///
/// Passed through to the channel client's download primitive; the pipeline
/// only inspects it to derive a filename extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Service-side identifier for the attachment
    pub id: String,
    /// Original filename, if the service exposes one
    pub filename: Option<String>,
    /// Declared size in bytes, if known
    pub size: Option<u64>,
}

impl AttachmentRef {
    /// Filename extension to use on disk.
    ///
    /// Taken from the original filename when present, otherwise "jpg"
    /// (channel media without a filename is a photo).
    pub fn extension(&self) -> &str {
        self.filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
            .filter(|ext| !ext.is_empty())
            .unwrap_or("jpg")
    }
}

/// One examined remote message
///
/// Immutable once recorded in the ledger; only the associated
/// [`DownloadOutcome`] transitions afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message id within the channel
    pub message_id: MessageId,
    /// When the message was posted
    pub timestamp: DateTime<Utc>,
    /// Author of the message
    pub sender_id: UserId,
    /// Author's display name (used in the on-disk filename)
    pub sender_display_name: String,
    /// Per-emoji reaction counts
    #[serde(default)]
    pub reactions: Vec<ReactionSummary>,
    /// Distinct reactor identities, when the service exposes them
    #[serde(default)]
    pub reactors: Vec<UserId>,
    /// Id of the message this one replies to, if any
    pub reply_target_id: Option<MessageId>,
    /// Whether the message carries a media attachment
    pub has_media: bool,
    /// Reference to the attachment when `has_media` is true
    pub attachment: Option<AttachmentRef>,
    /// Snippet of associated text (reply text), used in the filename
    pub text_snippet: Option<String>,
    /// Permalink to the message on the remote service
    pub source_url: Option<String>,
}

impl MessageRecord {
    /// Total reaction count across all emoji
    pub fn reaction_count(&self) -> u32 {
        self.reactions.iter().map(|r| r.count).sum()
    }
}

/// Download status of an attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Matched, not yet attempted
    Pending,
    /// Download attempt underway
    InProgress,
    /// Downloaded and integrity-checked
    Verified,
    /// All attempts exhausted or permanent error
    Failed,
    /// Deliberately excluded from downloading.
    ///
    /// The pipeline never writes this itself (items it passes over are
    /// reported in the run summary without an outcome); it is reserved for
    /// embedding applications that curate ledger entries out of future runs.
    Skipped,
}

impl DownloadStatus {
    /// Whether a transition from `self` to `next` follows the legal order.
    ///
    /// Pending -> InProgress -> {Verified, Failed}; Failed -> Pending is the
    /// explicit retry reset (the ledger enforces the retry ceiling on top of
    /// this). Rewriting the same status is always legal (idempotent no-op).
    pub fn can_transition_to(self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Pending, InProgress) | (Pending, Skipped) => true,
            (InProgress, Verified) | (InProgress, Failed) => true,
            (Failed, Pending) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::InProgress => "in_progress",
            DownloadStatus::Verified => "verified",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Size and content hash recorded at download time, re-checked by the verifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    /// File size in bytes
    pub size: u64,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
}

/// One attempted attachment download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Current status
    pub status: DownloadStatus,
    /// Final on-disk path, set once status reaches Verified
    pub local_path: Option<PathBuf>,
    /// Number of download attempts made (rate-limit waits do not count)
    pub attempt_count: u32,
    /// Last error message, set when status is Failed
    pub last_error: Option<String>,
    /// Integrity record captured when the download completed
    pub integrity: Option<Integrity>,
}

impl DownloadOutcome {
    /// A fresh Pending outcome with no attempts recorded
    pub fn pending() -> Self {
        Self {
            status: DownloadStatus::Pending,
            local_path: None,
            attempt_count: 0,
            last_error: None,
            integrity: None,
        }
    }
}

/// Selection criteria determining which messages' attachments are downloaded
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SelectionMode {
    /// Any message with at least one reaction
    AnyReaction,
    /// Messages replying to content authored by the target user
    RepliedToUser {
        /// The target user whose messages were replied to
        user: UserId,
    },
    /// Messages the target user reacted to
    ReactedByUser {
        /// The target user whose reactions select messages
        user: UserId,
    },
}

impl SelectionMode {
    /// Stable fingerprint stored in the ledger; runs with a different
    /// fingerprint refuse to reuse the ledger.
    pub fn fingerprint(&self) -> String {
        match self {
            SelectionMode::AnyReaction => "any_reaction".to_string(),
            SelectionMode::RepliedToUser { user } => format!("replied_to_user:{user}"),
            SelectionMode::ReactedByUser { user } => format!("reacted_by_user:{user}"),
        }
    }
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionMode::AnyReaction => write!(f, "any-reaction"),
            SelectionMode::RepliedToUser { user } => write!(f, "replied-to-user {user}"),
            SelectionMode::ReactedByUser { user } => write!(f, "reacted-by-user {user}"),
        }
    }
}

/// Per-message failure detail reported in the end-of-run summary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// The message whose download failed
    pub message_id: MessageId,
    /// Error text from the last attempt
    pub error: String,
    /// Attempts made before giving up
    pub attempts: u32,
}

/// End-of-run counters returned by the pipeline
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Messages pulled from the history stream
    pub scanned: u64,
    /// Messages that matched the selection mode
    pub matched: u64,
    /// Attachments downloaded and verified this run
    pub downloaded: u64,
    /// Attachments that exhausted their retries this run
    pub failed: u64,
    /// Matched messages skipped as already complete or frozen
    pub skipped: u64,
    /// Details for every failure, enough to reproduce by hand
    pub failures: Vec<FailureDetail>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use DownloadStatus::*;

    #[test]
    fn message_id_roundtrip_and_display() {
        let id = MessageId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<MessageId>().unwrap(), id);
        assert_eq!(i64::from(id), 42);
    }

    #[test]
    fn reaction_count_sums_all_emoji() {
        let record = record_with_reactions(vec![
            ReactionSummary { emoji: "👍".into(), count: 3 },
            ReactionSummary { emoji: "🔥".into(), count: 2 },
        ]);
        assert_eq!(record.reaction_count(), 5);
    }

    #[test]
    fn attachment_extension_from_filename() {
        let att = AttachmentRef {
            id: "a1".into(),
            filename: Some("clip.mp4".into()),
            size: None,
        };
        assert_eq!(att.extension(), "mp4");
    }

    #[test]
    fn attachment_extension_defaults_to_jpg() {
        let photo = AttachmentRef { id: "a2".into(), filename: None, size: None };
        assert_eq!(photo.extension(), "jpg");

        let no_ext = AttachmentRef {
            id: "a3".into(),
            filename: Some("raw".into()),
            size: None,
        };
        assert_eq!(no_ext.extension(), "jpg");
    }

    #[test]
    fn legal_transitions() {
        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Skipped));
        assert!(InProgress.can_transition_to(Verified));
        assert!(InProgress.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
    }

    #[test]
    fn identical_status_is_always_legal() {
        for s in [Pending, InProgress, Verified, Failed, Skipped] {
            assert!(s.can_transition_to(s), "{s} -> {s} should be a no-op");
        }
    }

    #[test]
    fn illegal_transitions() {
        assert!(
            !Pending.can_transition_to(Verified),
            "must pass through InProgress"
        );
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Verified.can_transition_to(Pending));
        assert!(!Verified.can_transition_to(InProgress));
        assert!(
            !Verified.can_transition_to(Failed),
            "downgrade is the verifier's call, not a forward transition"
        );
        assert!(!Skipped.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(Verified));
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        assert_eq!(SelectionMode::AnyReaction.fingerprint(), "any_reaction");
        assert_eq!(
            SelectionMode::RepliedToUser { user: UserId(7) }.fingerprint(),
            "replied_to_user:7"
        );
        assert_eq!(
            SelectionMode::ReactedByUser { user: UserId(7) }.fingerprint(),
            "reacted_by_user:7"
        );
        assert_ne!(
            SelectionMode::RepliedToUser { user: UserId(7) }.fingerprint(),
            SelectionMode::ReactedByUser { user: UserId(7) }.fingerprint()
        );
    }

    fn record_with_reactions(reactions: Vec<ReactionSummary>) -> MessageRecord {
        MessageRecord {
            message_id: MessageId(1),
            timestamp: Utc::now(),
            sender_id: UserId(1),
            sender_display_name: "tester".into(),
            reactions,
            reactors: vec![],
            reply_target_id: None,
            has_media: true,
            attachment: None,
            text_snippet: None,
            source_url: None,
        }
    }
}
