//! Write-through state store
//!
//! Wraps the in-memory [`State`] together with an output channel handle and
//! persists a full snapshot after every mutation. Callers never write state
//! themselves; going through the store is what guarantees that anything the
//! sync believes about its progress has already been emitted downstream.

use crate::error::Result;
use crate::output::OutputChannel;
use crate::state::State;
use crate::types::JsonValue;

/// State handle that persists on every mutation
#[derive(Debug, Clone)]
pub struct StateStore {
    state: State,
    output: OutputChannel,
}

impl StateStore {
    /// Create a store over an initial state
    pub fn new(state: State, output: OutputChannel) -> Self {
        Self { state, output }
    }

    /// Current state snapshot
    pub fn state(&self) -> &State {
        &self.state
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Bookmark value for a stream under a replication key
    pub fn cursor(&self, stream_id: &str, key: &str) -> Option<&str> {
        self.state.cursor(stream_id, key)
    }

    /// In-flight export id for a stream
    pub fn export_id(&self, stream_id: &str) -> Option<&str> {
        self.state.export_id(stream_id)
    }

    /// Window end of a stream's in-flight export
    pub fn export_end(&self, stream_id: &str) -> Option<&str> {
        self.state.export_end(stream_id)
    }

    /// Pagination resume token for a stream
    pub fn next_page_token(&self, stream_id: &str) -> Option<&str> {
        self.state.next_page_token(stream_id)
    }

    /// Stream currently being synced
    pub fn currently_syncing(&self) -> Option<&str> {
        self.state.currently_syncing()
    }

    // ========================================================================
    // Write-through mutations
    // ========================================================================

    /// Advance a stream's bookmark
    pub fn set_cursor(
        &mut self,
        stream_id: &str,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Result<()> {
        self.state.set_cursor(stream_id, key, value);
        self.persist()
    }

    /// Record an in-flight export for a stream
    pub fn set_export(&mut self, stream_id: &str, export_id: &str, export_end: &str) -> Result<()> {
        self.state.set_export(stream_id, export_id, export_end);
        self.persist()
    }

    /// Drop a stream's in-flight export markers
    pub fn clear_export(&mut self, stream_id: &str) -> Result<()> {
        self.state.clear_export(stream_id);
        self.persist()
    }

    /// Advance a stream's bookmark and drop its export markers in one write
    pub fn set_cursor_and_clear_export(
        &mut self,
        stream_id: &str,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Result<()> {
        self.state.set_cursor(stream_id, key, value);
        self.state.clear_export(stream_id);
        self.persist()
    }

    /// Set or clear a stream's pagination resume token
    pub fn set_next_page_token(&mut self, stream_id: &str, token: Option<&str>) -> Result<()> {
        self.state.set_next_page_token(stream_id, token);
        self.persist()
    }

    /// Advance a stream's bookmark and clear its resume token in one write
    pub fn set_cursor_and_clear_page_token(
        &mut self,
        stream_id: &str,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Result<()> {
        self.state.set_cursor(stream_id, key, value);
        self.state.set_next_page_token(stream_id, None);
        self.persist()
    }

    /// Mark which stream is being synced, or clear the marker
    pub fn set_currently_syncing(&mut self, stream_id: Option<&str>) -> Result<()> {
        self.state.set_currently_syncing(stream_id);
        self.persist()
    }

    /// Emit the current snapshot as a STATE message
    pub fn persist(&self) -> Result<()> {
        self.output.write_state(&self.state)
    }
}
