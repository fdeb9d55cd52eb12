//! On-disk naming for downloaded attachments
//!
//! Filenames are a deterministic function of the message's timestamp, sender
//! display name, total reaction count, and a sanitized snippet of associated
//! text, with the message id appended to guarantee uniqueness per
//! message+attachment pair.

use crate::types::MessageRecord;
use std::path::{Path, PathBuf};

/// Maximum length of a sanitized filename component, in characters
const MAX_COMPONENT_LEN: usize = 50;

/// Characters stripped from filename components
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitize text for use in a filename component.
///
/// Collapses whitespace, strips characters invalid on common filesystems,
/// replaces separators with underscores, collapses runs of underscores, and
/// truncates to [`MAX_COMPONENT_LEN`] characters. Empty input sanitizes to
/// "untitled".
pub fn sanitize(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut last_was_underscore = false;
    for ch in collapsed.chars() {
        if INVALID_CHARS.contains(&ch) {
            continue;
        }
        let mapped = if ch.is_whitespace() || ch == ',' { '_' } else { ch };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(mapped);
    }

    let truncated: String = out.chars().take(MAX_COMPONENT_LEN).collect();
    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated
    }
}

/// Base filename for a record: `{yymmdd_hhmm}_{sender}_r{reactions}_{snippet}`
pub fn base_filename(record: &MessageRecord) -> String {
    let stamp = record.timestamp.format("%y%m%d_%H%M");
    let sender = sanitize(if record.sender_display_name.is_empty() {
        "unnamed"
    } else {
        &record.sender_display_name
    });
    let snippet = sanitize(record.text_snippet.as_deref().unwrap_or("no_reply_text"));
    format!(
        "{stamp}_{sender}_r{reactions}_{snippet}",
        reactions = record.reaction_count()
    )
}

/// Final destination path for a record's attachment under `dir`.
///
/// The message id is embedded so two records with identical human-facing
/// components never collide.
pub fn dest_path(dir: &Path, record: &MessageRecord) -> PathBuf {
    let ext = record
        .attachment
        .as_ref()
        .map(|a| a.extension())
        .unwrap_or("jpg");
    dir.join(format!(
        "{}_{}.{ext}",
        base_filename(record),
        record.message_id
    ))
}

/// Temporary path used while a download is in flight.
///
/// Lives next to the final destination so the rename on success stays within
/// one filesystem.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
