//! Message classification
//!
//! Pure predicates deciding whether a message qualifies for download under
//! the configured selection mode. No I/O and no hidden state: the reply
//! author needed by the replied-to-user mode is resolved by the orchestrator
//! and passed in.

use crate::client::Capabilities;
use crate::error::{Error, Result};
use crate::types::{MessageRecord, SelectionMode, UserId};

/// Check that the channel client can provide the data `mode` needs.
///
/// Modes that would silently match nothing on a lesser client fail fast at
/// startup instead.
pub fn probe_capabilities(mode: &SelectionMode, caps: Capabilities) -> Result<()> {
    match mode {
        SelectionMode::AnyReaction => Ok(()),
        SelectionMode::RepliedToUser { .. } if !caps.reply_lookup => {
            Err(Error::CapabilityUnavailable {
                mode: mode.to_string(),
                missing: "reply-target author lookup",
            })
        }
        SelectionMode::ReactedByUser { .. } if !caps.per_reactor_identity => {
            Err(Error::CapabilityUnavailable {
                mode: mode.to_string(),
                missing: "per-reactor identity",
            })
        }
        _ => Ok(()),
    }
}

/// Whether classifying under `mode` requires resolving the reply target's author
pub fn needs_reply_lookup(mode: &SelectionMode) -> bool {
    matches!(mode, SelectionMode::RepliedToUser { .. })
}

/// Decide whether `record` matches the selection mode.
///
/// `reply_author` is the resolved author of `record.reply_target_id`, when
/// the orchestrator looked it up; only the replied-to-user mode consults it.
/// A message without media never matches, regardless of criteria: matching
/// operates at message granularity but only media produces download work.
pub fn matches(
    record: &MessageRecord,
    mode: &SelectionMode,
    reply_author: Option<UserId>,
) -> bool {
    if !record.has_media {
        return false;
    }
    match mode {
        SelectionMode::AnyReaction => record.reaction_count() > 0,
        SelectionMode::RepliedToUser { user } => {
            record.reply_target_id.is_some() && reply_author == Some(*user)
        }
        SelectionMode::ReactedByUser { user } => record.reactors.contains(user),
    }
}
