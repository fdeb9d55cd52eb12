//! Shared test helpers: a scriptable in-memory channel client and a
//! recording sleeper so retry/rate-limit behavior is tested without delays.

use crate::client::{Capabilities, ChannelClient};
use crate::error::{Error, Result};
use crate::retry::Sleeper;
use crate::types::{AttachmentRef, MessageId, MessageRecord, ReactionSummary, UserId};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Scripted response for one download call
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Write the attachment bytes and succeed
    Succeed,
    /// Fail with a transient transport error
    Transient(&'static str),
    /// Fail with a rate-limit signal
    RateLimited(Option<Duration>),
    /// Fail with a permanent error
    Permanent(&'static str),
}

/// In-memory [`ChannelClient`] with scriptable download behavior.
///
/// Downloads succeed by default, writing `media-<attachment id>` to the
/// destination; per-attachment behavior scripts are consumed in order, then
/// fall back to Succeed.
pub(crate) struct MockChannelClient {
    messages: Vec<MessageRecord>,
    authors: HashMap<MessageId, UserId>,
    caps: Capabilities,
    behaviors: Mutex<HashMap<String, VecDeque<Behavior>>>,
    author_behaviors: Mutex<HashMap<MessageId, VecDeque<Behavior>>>,
    download_calls: AtomicU32,
    author_calls: AtomicU32,
}

impl MockChannelClient {
    pub(crate) fn new(messages: Vec<MessageRecord>) -> Self {
        Self {
            messages,
            authors: HashMap::new(),
            caps: Capabilities {
                per_reactor_identity: true,
                reply_lookup: true,
            },
            behaviors: Mutex::new(HashMap::new()),
            author_behaviors: Mutex::new(HashMap::new()),
            download_calls: AtomicU32::new(0),
            author_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub(crate) fn with_author(mut self, id: MessageId, author: UserId) -> Self {
        self.authors.insert(id, author);
        self
    }

    /// Script the next download calls for one attachment id
    pub(crate) fn script(self, attachment_id: &str, behaviors: Vec<Behavior>) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(attachment_id.to_string(), behaviors.into());
        self
    }

    /// Script the next author-lookup calls for one message id
    pub(crate) fn script_author(self, id: MessageId, behaviors: Vec<Behavior>) -> Self {
        self.author_behaviors
            .lock()
            .unwrap()
            .insert(id, behaviors.into());
        self
    }

    pub(crate) fn download_calls(&self) -> u32 {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn author_calls(&self) -> u32 {
        self.author_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelClient for MockChannelClient {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn history(&self, cursor: Option<MessageId>) -> BoxStream<'static, Result<MessageRecord>> {
        let mut items: Vec<MessageRecord> = self
            .messages
            .iter()
            .filter(|m| cursor.is_none_or(|c| m.message_id > c))
            .cloned()
            .collect();
        items.sort_by_key(|m| m.message_id);
        futures::stream::iter(items.into_iter().map(Ok)).boxed()
    }

    async fn message_author(&self, id: MessageId) -> Result<Option<UserId>> {
        self.author_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .author_behaviors
            .lock()
            .unwrap()
            .get_mut(&id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => Ok(self.authors.get(&id).copied()),
            Behavior::Transient(msg) => Err(Error::Transport(msg.to_string())),
            Behavior::RateLimited(retry_after) => Err(Error::RateLimited { retry_after }),
            Behavior::Permanent(msg) => Err(Error::NotFound(msg.to_string())),
        }
    }

    async fn download(&self, attachment: &AttachmentRef, dest: &Path) -> Result<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get_mut(&attachment.id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => {
                std::fs::write(dest, format!("media-{}", attachment.id))?;
                Ok(())
            }
            Behavior::Transient(msg) => Err(Error::Transport(msg.to_string())),
            Behavior::RateLimited(retry_after) => Err(Error::RateLimited { retry_after }),
            Behavior::Permanent(msg) => Err(Error::NotFound(msg.to_string())),
        }
    }
}

/// [`Sleeper`] that records requested durations and returns immediately
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// A media-bearing message with the given id and total reaction count
pub(crate) fn media_message(id: i64, reaction_count: u32) -> MessageRecord {
    MessageRecord {
        message_id: MessageId(id),
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::minutes(id),
        sender_id: UserId(1000),
        sender_display_name: "generator".into(),
        reactions: if reaction_count > 0 {
            vec![ReactionSummary { emoji: "👍".into(), count: reaction_count }]
        } else {
            vec![]
        },
        reactors: vec![],
        reply_target_id: None,
        has_media: true,
        attachment: Some(AttachmentRef {
            id: format!("att-{id}"),
            filename: None,
            size: None,
        }),
        text_snippet: Some(format!("prompt {id}")),
        source_url: Some(format!("https://example.test/channel/{id}")),
    }
}

/// A text-only message with the given id and total reaction count
pub(crate) fn text_message(id: i64, reaction_count: u32) -> MessageRecord {
    let mut record = media_message(id, reaction_count);
    record.has_media = false;
    record.attachment = None;
    record
}
