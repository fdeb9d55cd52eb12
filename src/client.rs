//! Channel client boundary
//!
//! The remote messaging service is consumed through the [`ChannelClient`]
//! trait. Connection, authentication, and pagination transport live in the
//! implementation supplied by the embedding application; the pipeline only
//! sees an ordered record stream, a reply-author lookup, and a blocking
//! download primitive that surfaces rate-limit signals distinctly from other
//! transport errors.

use crate::error::Result;
use crate::types::{AttachmentRef, MessageId, MessageRecord, UserId};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

/// What the connected channel client can provide
///
/// Probed once at startup; selection modes that need an absent capability
/// fail fast instead of silently matching nothing.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Reaction summaries include the identity of each reactor
    pub per_reactor_identity: bool,
    /// The author of an arbitrary message id can be resolved
    pub reply_lookup: bool,
}

/// Interface to the remote messaging channel
///
/// History enumeration is lazy, forward-only, and restartable from a cursor:
/// `history(Some(id))` yields only messages with ids strictly greater than
/// `id`, in ascending id order. Implementations own their connection/session
/// lifecycle for the duration of the run.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Capabilities of this client/service combination
    fn capabilities(&self) -> Capabilities;

    /// Lazily enumerate the channel history after `cursor` (oldest first)
    fn history(&self, cursor: Option<MessageId>) -> BoxStream<'static, Result<MessageRecord>>;

    /// Resolve the author of a message, used for reply-ancestry selection.
    ///
    /// Returns `Ok(None)` when the message no longer exists.
    async fn message_author(&self, id: MessageId) -> Result<Option<UserId>>;

    /// Download an attachment's bytes to `dest`, overwriting any existing
    /// file at that path.
    ///
    /// Rate-limit signals must be surfaced as
    /// [`Error::RateLimited`](crate::error::Error::RateLimited) and transient
    /// transport problems as
    /// [`Error::Transport`](crate::error::Error::Transport); the fetcher's
    /// retry policy depends on the distinction.
    async fn download(&self, attachment: &AttachmentRef, dest: &Path) -> Result<()>;
}
