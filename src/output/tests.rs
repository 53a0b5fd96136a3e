//! Tests for the output channel

use super::*;
use crate::state::State;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Message Serialization Tests
// ============================================================================

#[test]
fn test_schema_message_shape() {
    let (channel, capture) = OutputChannel::in_memory();
    channel
        .write_schema(
            "leads",
            json!({"type": "object", "properties": {"id": {"type": "integer"}}}),
            &["id".to_string()],
        )
        .unwrap();

    let messages = capture.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "SCHEMA");
    assert_eq!(messages[0]["stream"], "leads");
    assert_eq!(messages[0]["key_properties"], json!(["id"]));
    assert_eq!(messages[0]["schema"]["properties"]["id"]["type"], "integer");
}

#[test]
fn test_record_message_shape() {
    let (channel, capture) = OutputChannel::in_memory();
    let mut record = Row::new();
    record.insert("id".to_string(), json!(42));
    record.insert("email".to_string(), json!("a@b.com"));
    channel.write_record("leads", record).unwrap();

    let records = capture.records_for("leads");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], 42);
    assert_eq!(records[0]["email"], "a@b.com");
}

#[test]
fn test_state_message_carries_full_snapshot() {
    let (channel, capture) = OutputChannel::in_memory();
    let mut state = State::default();
    state.set_currently_syncing(Some("leads"));
    channel.write_state(&state).unwrap();

    let last = capture.last_state().unwrap();
    assert_eq!(last["currently_syncing"], "leads");
    assert!(last["bookmarks"].is_object());
}

#[test]
fn test_one_message_per_line() {
    let (channel, capture) = OutputChannel::in_memory();
    channel.write_record("a", Row::new()).unwrap();
    channel.write_record("b", Row::new()).unwrap();
    channel.write_state(&State::default()).unwrap();

    let contents = capture.contents();
    assert_eq!(contents.lines().count(), 3);
    assert!(contents.ends_with('\n'));
}

// ============================================================================
// Capture Accessor Tests
// ============================================================================

#[test]
fn test_records_for_filters_by_stream() {
    let (channel, capture) = OutputChannel::in_memory();
    let mut lead = Row::new();
    lead.insert("id".to_string(), json!(1));
    channel.write_record("leads", lead).unwrap();
    channel.write_record("campaigns", Row::new()).unwrap();

    assert_eq!(capture.records_for("leads").len(), 1);
    assert_eq!(capture.records_for("campaigns").len(), 1);
    assert_eq!(capture.records_for("programs").len(), 0);
}

#[test]
fn test_state_writes_counts_only_state_messages() {
    let (channel, capture) = OutputChannel::in_memory();
    channel.write_record("leads", Row::new()).unwrap();
    channel.write_state(&State::default()).unwrap();
    channel.write_state(&State::default()).unwrap();

    assert_eq!(capture.state_writes(), 2);
}

#[test]
fn test_channel_clones_share_the_writer() {
    let (channel, capture) = OutputChannel::in_memory();
    let other = channel.clone();
    channel.write_record("leads", Row::new()).unwrap();
    other.write_record("leads", Row::new()).unwrap();

    assert_eq!(capture.records_for("leads").len(), 2);
}
