//! Common test utilities for channel-dl integration tests

use async_trait::async_trait;
use channel_dl::{
    AttachmentRef, Capabilities, ChannelClient, MessageId, MessageRecord, ReactionSummary, Result,
    UserId,
};
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

/// In-memory channel whose history is fixed up front.
///
/// Downloads always succeed, writing `payload-<attachment id>` bytes to the
/// destination so tests can assert on file contents.
pub struct FixedChannel {
    messages: Vec<MessageRecord>,
    download_calls: AtomicU32,
}

#[allow(dead_code)]
impl FixedChannel {
    pub fn new(messages: Vec<MessageRecord>) -> Self {
        Self {
            messages,
            download_calls: AtomicU32::new(0),
        }
    }

    pub fn download_calls(&self) -> u32 {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelClient for FixedChannel {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            per_reactor_identity: true,
            reply_lookup: true,
        }
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
        Ok(self.messages.iter().find(|m| m.message_id == id).map(|m| m.sender_id))
    }

    async fn download(&self, attachment: &AttachmentRef, dest: &Path) -> Result<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(dest, format!("payload-{}", attachment.id))?;
        Ok(())
    }
}

/// A photo post with the given id and reaction count
pub fn photo_post(id: i64, reactions: u32) -> MessageRecord {
    MessageRecord {
        message_id: MessageId(id),
        timestamp: Utc
            .with_ymd_and_hms(2024, 3, 15, 9, 30, 0)
            .single()
            .unwrap_or_default()
            + chrono::Duration::minutes(id),
        sender_id: UserId(500),
        sender_display_name: "alice".to_string(),
        reactions: if reactions > 0 {
            vec![ReactionSummary {
                emoji: "❤️".to_string(),
                count: reactions,
            }]
        } else {
            Vec::new()
        },
        reactors: Vec::new(),
        reply_target_id: None,
        has_media: true,
        attachment: Some(AttachmentRef {
            id: format!("photo-{id}"),
            filename: Some(format!("IMG_{id:04}.jpg")),
            size: None,
        }),
        text_snippet: Some(format!("sunset over the bay {id}")),
        source_url: Some(format!("https://example.org/c/demo/{id}")),
    }
}

/// A plain text post with no attachment
#[allow(dead_code)]
pub fn text_post(id: i64, reactions: u32) -> MessageRecord {
    let mut record = photo_post(id, reactions);
    record.has_media = false;
    record.attachment = None;
    record
}
