//! Captured-page entries: packaging, the bounded entry list and merging.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExtractionResult, ToolkitError, ToolkitResult};

/// Stored text and markup are cut to this many characters.
pub const MAX_TEXT_CHARS: usize = 100_000;
/// Length of the list-view excerpt.
pub const EXCERPT_CHARS: usize = 200;
/// Merge banner time, rendered in the local time zone.
pub const MERGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Entries beyond this count are dropped, oldest first.
pub const MAX_ENTRIES: usize = 200;

pub const UNTITLED_PAGE: &str = "Untitled Page";

/// One persisted captured page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub url: String,
    pub title: String,
    pub excerpt_text: String,
    pub full_text: String,
    pub html_optional: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// True when the text or the markup exceeded [`MAX_TEXT_CHARS`].
    #[serde(default)]
    pub trimmed: bool,
}

impl Entry {
    /// Package an extraction result captured from a tab with `url`/`title`.
    pub fn from_capture(
        result: &ExtractionResult,
        url: &str,
        title: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED_PAGE);
        let trimmed = exceeds(&result.text, MAX_TEXT_CHARS) || exceeds(&result.html, MAX_TEXT_CHARS);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            title: title.to_string(),
            excerpt_text: prefix(&result.text, EXCERPT_CHARS).to_string(),
            full_text: prefix(&result.text, MAX_TEXT_CHARS).to_string(),
            html_optional: (!result.html.is_empty())
                .then(|| prefix(&result.html, MAX_TEXT_CHARS).to_string()),
            timestamp,
            trimmed,
        }
    }
}

fn exceeds(s: &str, max_chars: usize) -> bool {
    s.char_indices().nth(max_chars).is_some()
}

/// The first `max_chars` characters of `s`.
fn prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Newest-first entry list capped at [`MAX_ENTRIES`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryLog {
    entries: Vec<Entry>,
}

impl EntryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from stored entries, enforcing the cap.
    pub fn from_entries(mut entries: Vec<Entry>) -> Self {
        entries.truncate(MAX_ENTRIES);
        Self { entries }
    }

    /// Add `entry` at the front, dropping the oldest beyond the cap.
    pub fn push(&mut self, entry: Entry) {
        self.entries.insert(0, entry);
        if self.entries.len() > MAX_ENTRIES {
            self.entries.truncate(MAX_ENTRIES);
            tracing::debug!("Trimmed entries to {MAX_ENTRIES} limit");
        }
    }

    /// Remove the entry with `id`. Returns whether one was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which header lines a merge writes per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSettings {
    #[serde(default = "default_true")]
    pub include_title: bool,
    #[serde(rename = "includeURL", default = "default_true")]
    pub include_url: bool,
    #[serde(default = "default_true")]
    pub include_time: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            include_title: true,
            include_url: true,
            include_time: true,
        }
    }
}

impl MergeSettings {
    fn any(&self) -> bool {
        self.include_title || self.include_url || self.include_time
    }
}

/// Merge the entries of `log` whose ids are in `ids` into one text.
///
/// Selected entries are ordered by timestamp, oldest first, regardless of
/// the order of `ids`. Unknown ids are ignored.
pub fn merge_entries(log: &[Entry], ids: &[String], settings: &MergeSettings) -> ToolkitResult<String> {
    let mut selected: Vec<&Entry> = log.iter().filter(|e| ids.contains(&e.id)).collect();
    if selected.is_empty() {
        return Err(ToolkitError::NothingSelected);
    }
    selected.sort_by_key(|e| e.timestamp);

    let banner = "=".repeat(14);
    let mut merged = String::new();
    for (index, entry) in selected.iter().enumerate() {
        if index > 0 {
            merged.push_str("\n\n");
        }
        merged.push_str(&format!("{banner} Page {} {banner}\n", index + 1));

        if settings.include_title {
            merged.push_str(&format!("Title: {}\n", entry.title));
        }
        if settings.include_url {
            merged.push_str(&format!("URL: {}\n", entry.url));
        }
        if settings.include_time {
            let local = entry.timestamp.with_timezone(&Local);
            merged.push_str(&format!("Time: {}\n", local.format(MERGE_TIME_FORMAT)));
        }
        if settings.any() {
            merged.push('\n');
        }
        merged.push_str(&entry.full_text);
    }

    tracing::debug!(entries = selected.len(), chars = merged.len(), "Merged entries");
    Ok(merged)
}
