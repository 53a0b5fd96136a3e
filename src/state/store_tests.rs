//! Tests for StateStore

use super::*;
use crate::output::OutputChannel;
use pretty_assertions::assert_eq;
use serde_json::json;

fn store_with_capture() -> (StateStore, crate::output::MessageCapture) {
    let (output, capture) = OutputChannel::in_memory();
    (StateStore::new(State::new(), output), capture)
}

// ============================================================================
// Write-Through Tests
// ============================================================================

#[test]
fn test_set_cursor_persists_once() {
    let (mut store, capture) = store_with_capture();

    store
        .set_cursor("leads", "updatedAt", "2024-01-01T00:00:00+00:00")
        .unwrap();

    assert_eq!(capture.state_writes(), 1);
    let state = capture.last_state().unwrap();
    assert_eq!(
        state["bookmarks"]["leads"]["updatedAt"],
        "2024-01-01T00:00:00+00:00"
    );
}

#[test]
fn test_set_export_persists_both_markers() {
    let (mut store, capture) = store_with_capture();

    store
        .set_export("leads", "1234", "2024-02-01T00:00:00+00:00")
        .unwrap();

    let state = capture.last_state().unwrap();
    assert_eq!(state["bookmarks"]["leads"]["export_id"], "1234");
    assert_eq!(
        state["bookmarks"]["leads"]["export_end"],
        "2024-02-01T00:00:00+00:00"
    );
    assert_eq!(store.export_id("leads"), Some("1234"));
}

#[test]
fn test_clear_export_removes_markers_from_snapshot() {
    let (mut store, capture) = store_with_capture();

    store
        .set_export("leads", "1234", "2024-02-01T00:00:00+00:00")
        .unwrap();
    store.clear_export("leads").unwrap();

    let state = capture.last_state().unwrap();
    assert!(state["bookmarks"]["leads"].get("export_id").is_none());
    assert!(state["bookmarks"]["leads"].get("export_end").is_none());
    assert_eq!(capture.state_writes(), 2);
}

#[test]
fn test_set_cursor_and_clear_export_is_one_write() {
    let (mut store, capture) = store_with_capture();

    store
        .set_export("leads", "1234", "2024-02-01T00:00:00+00:00")
        .unwrap();
    store
        .set_cursor_and_clear_export("leads", "updatedAt", "2024-02-01T00:00:00+00:00")
        .unwrap();

    assert_eq!(capture.state_writes(), 2);
    let state = capture.last_state().unwrap();
    assert_eq!(
        state["bookmarks"]["leads"]["updatedAt"],
        "2024-02-01T00:00:00+00:00"
    );
    assert!(state["bookmarks"]["leads"].get("export_id").is_none());
}

#[test]
fn test_next_page_token_set_and_clear() {
    let (mut store, capture) = store_with_capture();

    store.set_next_page_token("campaigns", Some("abc")).unwrap();
    assert_eq!(store.next_page_token("campaigns"), Some("abc"));

    store.set_next_page_token("campaigns", None).unwrap();
    assert!(store.next_page_token("campaigns").is_none());

    let state = capture.last_state().unwrap();
    assert!(state["bookmarks"]["campaigns"]
        .get("next_page_token")
        .is_none());
}

#[test]
fn test_set_cursor_and_clear_page_token_is_one_write() {
    let (mut store, capture) = store_with_capture();

    store.set_next_page_token("campaigns", Some("abc")).unwrap();
    store
        .set_cursor_and_clear_page_token("campaigns", "createdAt", "2024-03-01T00:00:00+00:00")
        .unwrap();

    assert_eq!(capture.state_writes(), 2);
    let state = capture.last_state().unwrap();
    assert_eq!(
        state["bookmarks"]["campaigns"]["createdAt"],
        "2024-03-01T00:00:00+00:00"
    );
    assert!(state["bookmarks"]["campaigns"]
        .get("next_page_token")
        .is_none());
}

#[test]
fn test_currently_syncing_persists() {
    let (mut store, capture) = store_with_capture();

    store.set_currently_syncing(Some("leads")).unwrap();
    assert_eq!(
        capture.last_state().unwrap()["currently_syncing"],
        "leads"
    );

    store.set_currently_syncing(None).unwrap();
    assert_eq!(capture.last_state().unwrap()["currently_syncing"], json!(null));
}

// ============================================================================
// Read Tests
// ============================================================================

#[test]
fn test_reads_reflect_initial_state() {
    let (output, _capture) = OutputChannel::in_memory();
    let mut initial = State::new();
    initial.set_cursor("leads", "updatedAt", "2023-06-01T00:00:00+00:00");
    initial.set_next_page_token("lists", Some("tok"));

    let store = StateStore::new(initial, output);
    assert_eq!(
        store.cursor("leads", "updatedAt"),
        Some("2023-06-01T00:00:00+00:00")
    );
    assert_eq!(store.next_page_token("lists"), Some("tok"));
    assert!(store.export_id("leads").is_none());
}

#[test]
fn test_persist_emits_current_snapshot() {
    let (store, capture) = store_with_capture();

    store.persist().unwrap();
    let state = capture.last_state().unwrap();
    assert_eq!(state["bookmarks"], json!({}));
}
