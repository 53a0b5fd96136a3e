//! State types for tracking sync progress
//!
//! These types are serialized into every STATE message and persisted between
//! runs. The layout keeps per-stream bookmarks under `bookmarks` and the
//! in-flight stream under `currently_syncing`, so a restarted sync can resume
//! where the previous run stopped.

use crate::error::Result;
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Complete sync state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: HashMap<String, StreamBookmarks>,

    /// Stream currently being synced, if a sync is in flight
    #[serde(default)]
    pub currently_syncing: Option<String>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse state from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load state from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Get bookmarks for a stream
    pub fn stream(&self, stream_id: &str) -> Option<&StreamBookmarks> {
        self.bookmarks.get(stream_id)
    }

    /// Get mutable bookmarks for a stream, creating if needed
    pub fn stream_mut(&mut self, stream_id: &str) -> &mut StreamBookmarks {
        self.bookmarks.entry(stream_id.to_string()).or_default()
    }

    /// Get a stream's bookmark value under a replication key
    pub fn cursor(&self, stream_id: &str, key: &str) -> Option<&str> {
        self.bookmarks.get(stream_id)?.cursors.get(key)?.as_str()
    }

    /// Set a stream's bookmark value under a replication key
    pub fn set_cursor(&mut self, stream_id: &str, key: &str, value: impl Into<JsonValue>) {
        self.stream_mut(stream_id)
            .cursors
            .insert(key.to_string(), value.into());
    }

    /// Get a stream's in-flight export id
    pub fn export_id(&self, stream_id: &str) -> Option<&str> {
        self.bookmarks.get(stream_id)?.export_id.as_deref()
    }

    /// Get the window end of a stream's in-flight export
    pub fn export_end(&self, stream_id: &str) -> Option<&str> {
        self.bookmarks.get(stream_id)?.export_end.as_deref()
    }

    /// Record an in-flight export for a stream
    pub fn set_export(&mut self, stream_id: &str, export_id: &str, export_end: &str) {
        let bookmarks = self.stream_mut(stream_id);
        bookmarks.export_id = Some(export_id.to_string());
        bookmarks.export_end = Some(export_end.to_string());
    }

    /// Drop a stream's in-flight export, if any
    pub fn clear_export(&mut self, stream_id: &str) {
        if let Some(bookmarks) = self.bookmarks.get_mut(stream_id) {
            bookmarks.export_id = None;
            bookmarks.export_end = None;
        }
    }

    /// Get a stream's pagination resume token
    pub fn next_page_token(&self, stream_id: &str) -> Option<&str> {
        self.bookmarks.get(stream_id)?.next_page_token.as_deref()
    }

    /// Set or clear a stream's pagination resume token
    pub fn set_next_page_token(&mut self, stream_id: &str, token: Option<&str>) {
        self.stream_mut(stream_id).next_page_token = token.map(str::to_string);
    }

    /// Stream currently being synced
    pub fn currently_syncing(&self) -> Option<&str> {
        self.currently_syncing.as_deref()
    }

    /// Mark which stream is being synced, or clear the marker
    pub fn set_currently_syncing(&mut self, stream_id: Option<&str>) {
        self.currently_syncing = stream_id.map(str::to_string);
    }
}

/// Bookmarks for a single stream
///
/// The export and pagination fields are omitted from the serialized form when
/// unset, so a finished stream leaves no trace of its in-flight markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamBookmarks {
    /// In-flight bulk export id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_id: Option<String>,

    /// Window end timestamp of the in-flight export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_end: Option<String>,

    /// Resume token for paginated streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    /// Bookmark values keyed by replication key
    #[serde(default, flatten)]
    pub cursors: HashMap<String, JsonValue>,
}
