//! Output channel
//!
//! Emits singer-style JSON-lines messages: one `SCHEMA`, `RECORD`, or `STATE`
//! object per line, flushed after every message so a crash never loses an
//! acknowledged write. The channel is a cheap cloneable handle over a shared
//! writer, letting the state store own its own write-through handle while the
//! orchestrator emits schemas and records.

use crate::error::{Error, Result};
use crate::state::State;
use crate::types::{JsonValue, Row};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[cfg(test)]
mod tests;

// ============================================================================
// Messages
// ============================================================================

/// One emitted message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "SCHEMA")]
    Schema {
        stream: String,
        schema: JsonValue,
        key_properties: Vec<String>,
    },

    #[serde(rename = "RECORD")]
    Record { stream: String, record: Row },

    #[serde(rename = "STATE")]
    State { value: JsonValue },
}

// ============================================================================
// Output Channel
// ============================================================================

/// Shared handle to the message sink
#[derive(Clone)]
pub struct OutputChannel {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputChannel {
    /// Channel writing to stdout
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Channel writing to an arbitrary sink
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Channel writing to an in-memory buffer, with a capture handle for
    /// inspecting everything that was emitted
    pub fn in_memory() -> (Self, MessageCapture) {
        let capture = MessageCapture::default();
        let channel = Self::from_writer(CaptureWriter(Arc::clone(&capture.buf)));
        (channel, capture)
    }

    /// Emit a SCHEMA message
    pub fn write_schema(
        &self,
        stream_id: &str,
        schema: JsonValue,
        key_properties: &[String],
    ) -> Result<()> {
        self.write_message(&Message::Schema {
            stream: stream_id.to_string(),
            schema,
            key_properties: key_properties.to_vec(),
        })
    }

    /// Emit a RECORD message
    pub fn write_record(&self, stream_id: &str, record: Row) -> Result<()> {
        self.write_message(&Message::Record {
            stream: stream_id.to_string(),
            record,
        })
    }

    /// Emit a STATE message carrying the full state snapshot
    pub fn write_state(&self, state: &State) -> Result<()> {
        self.write_message(&Message::State {
            value: serde_json::to_value(state)?,
        })
    }

    fn write_message(&self, message: &Message) -> Result<()> {
        let line = serde_json::to_string(message)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::output("output writer lock poisoned"))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputChannel").finish()
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Log a per-stream record-count counter
pub fn record_counter(stream_id: &str, value: usize) {
    tracing::info!(
        target: "metrics",
        counter = "record_count",
        stream = %stream_id,
        value,
        "stream emitted {value} records"
    );
}

// ============================================================================
// Test Capture
// ============================================================================

/// Handle over an in-memory channel's buffer, with parsed accessors
#[derive(Clone, Default)]
pub struct MessageCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MessageCapture {
    /// Raw emitted bytes as a string
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().expect("capture lock poisoned");
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Every emitted message, parsed back from its JSON line
    pub fn messages(&self) -> Vec<JsonValue> {
        self.contents()
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).expect("captured line is not JSON"))
            .collect()
    }

    /// Messages of one type (`SCHEMA`, `RECORD`, `STATE`)
    pub fn messages_of_type(&self, message_type: &str) -> Vec<JsonValue> {
        self.messages()
            .into_iter()
            .filter(|m| m["type"] == message_type)
            .collect()
    }

    /// Record payloads emitted for a stream, in order
    pub fn records_for(&self, stream_id: &str) -> Vec<JsonValue> {
        self.messages()
            .into_iter()
            .filter(|m| m["type"] == "RECORD" && m["stream"] == stream_id)
            .map(|m| m["record"].clone())
            .collect()
    }

    /// The most recent STATE payload, if any was written
    pub fn last_state(&self) -> Option<JsonValue> {
        self.messages_of_type("STATE")
            .last()
            .map(|m| m["value"].clone())
    }

    /// Number of STATE messages written
    pub fn state_writes(&self) -> usize {
        self.messages_of_type("STATE").len()
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::other("capture lock poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
