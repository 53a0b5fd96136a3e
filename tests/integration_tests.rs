//! Integration tests using a mock Marketo server
//!
//! Tests the full end-to-end flow: OAuth token fetch, bulk export lifecycle
//! with ranged CSV downloads, REST pagination, and the message stream a sync
//! emits.

use std::sync::Arc;

use chrono::{Duration, Timelike, Utc};
use marketo_source::catalog::Catalog;
use marketo_source::client::HttpMarketoClient;
use marketo_source::config::Config;
use marketo_source::output::OutputChannel;
use marketo_source::state::State;
use marketo_source::sync::Syncer;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn test_config(server: &MockServer) -> Config {
    Config::from_json(
        &json!({
            "endpoint": server.uri(),
            "client_id": "id-123",
            "client_secret": "secret-456",
            "start_date": "2020-01-01T00:00:00Z",
            // A tiny chunk size forces the export download through many
            // ranged requests.
            "export_chunk_size": 5,
            "poll_interval_seconds": 0,
            "max_retries": 1,
        })
        .to_string(),
    )
    .unwrap()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/identity/oauth/token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(query_param("client_id", "id-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-abc",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

fn leads_catalog() -> Catalog {
    Catalog::from_json(
        &json!({
            "streams": [{
                "tap_stream_id": "leads",
                "stream": "leads",
                "replication_key": "updatedAt",
                "key_properties": ["id"],
                "schema": {
                    "type": "object",
                    "selected": true,
                    "properties": {
                        "id": {"type": ["null", "integer"], "inclusion": "automatic"},
                        "email": {"type": ["null", "string"], "selected": true},
                        "updatedAt": {
                            "type": ["null", "string"],
                            "format": "date-time",
                            "inclusion": "automatic"
                        }
                    }
                }
            }]
        })
        .to_string(),
    )
    .unwrap()
}

fn campaigns_catalog() -> Catalog {
    Catalog::from_json(
        &json!({
            "streams": [{
                "tap_stream_id": "campaigns",
                "stream": "campaigns",
                "replication_key": "updatedAt",
                "key_properties": ["id"],
                "schema": {
                    "type": "object",
                    "selected": true,
                    "properties": {
                        "id": {"type": ["null", "integer"], "inclusion": "automatic"},
                        "name": {"type": ["null", "string"], "selected": true},
                        "updatedAt": {
                            "type": ["null", "string"],
                            "format": "date-time",
                            "inclusion": "automatic"
                        }
                    }
                }
            }]
        })
        .to_string(),
    )
    .unwrap()
}

/// Serves a file in slices according to the request's Range header
struct RangedFile(Vec<u8>);

impl Respond for RangedFile {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("Range")
            .and_then(|v| v.to_str().ok())
            .expect("file requests carry a Range header");
        let spec = range.strip_prefix("bytes=").expect("range uses bytes unit");
        let (start, end) = spec.split_once('-').expect("range has two bounds");
        let start: usize = start.parse().unwrap();
        let end = end.parse::<usize>().unwrap().min(self.0.len() - 1);
        ResponseTemplate::new(206).set_body_bytes(self.0[start..=end].to_vec())
    }
}

// ============================================================================
// Credential Check
// ============================================================================

#[tokio::test]
async fn test_check_credentials_fetches_a_token() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let client = HttpMarketoClient::new(test_config(&server)).unwrap();
    client.check_credentials().await.unwrap();
}

#[tokio::test]
async fn test_check_credentials_surfaces_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/identity/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let client = HttpMarketoClient::new(test_config(&server)).unwrap();
    let err = client.check_credentials().await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

// ============================================================================
// Bulk Export End to End
// ============================================================================

#[tokio::test]
async fn test_leads_sync_end_to_end() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let now = Utc::now().with_nanosecond(0).unwrap();
    let bookmark = now - Duration::days(10);
    let fresh = (bookmark + Duration::days(1)).to_rfc3339();
    let stale = (bookmark - Duration::days(2)).to_rfc3339();

    // The é lands across the 5-byte download chunks, so the decoder's
    // held-back-suffix path runs against the real client.
    let csv = format!(
        "id,email,updatedAt\n\
         7,aé@example.com,{fresh}\n\
         8,old@example.com,{stale}\n\
         9,b@example.com,{fresh}\n"
    );

    Mock::given(method("POST"))
        .and(path("/bulk/v1/leads/export/create.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"exportId": "e-1", "status": "Created"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The first status poll sees the job still parked, which must trigger
    // exactly one enqueue before polling resumes.
    Mock::given(method("GET"))
        .and(path("/bulk/v1/leads/export/e-1/status.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"status": "Created"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bulk/v1/leads/export/e-1/enqueue.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"status": "Queued"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bulk/v1/leads/export/e-1/status.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"status": "Completed", "fileSize": csv.len()}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bulk/v1/leads/export/e-1/file.json"))
        .respond_with(RangedFile(csv.clone().into_bytes()))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let client = Arc::new(HttpMarketoClient::new(config.clone()).unwrap());
    let mut state = State::new();
    state.set_cursor("leads", "updatedAt", bookmark.to_rfc3339());

    let (output, capture) = OutputChannel::in_memory();
    let mut syncer = Syncer::new(client, leads_catalog(), &config, state, output);
    syncer.run().await.unwrap();

    // One schema, the fresh rows written in file order, the row older than
    // the bookmark dropped.
    assert_eq!(capture.messages_of_type("SCHEMA").len(), 1);
    let records = capture.records_for("leads");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], 7);
    assert_eq!(records[0]["email"], "aé@example.com");
    assert_eq!(records[1]["id"], 9);

    // The sync closed out: bookmark advanced to the sync's start, no export
    // left in flight.
    let last = capture.last_state().unwrap();
    let final_bookmark = last["bookmarks"]["leads"]["updatedAt"].as_str().unwrap();
    let final_bookmark = chrono::DateTime::parse_from_rfc3339(final_bookmark).unwrap();
    assert!(final_bookmark >= now);
    assert!(last["bookmarks"]["leads"].get("export_id").is_none());
    assert_eq!(last["currently_syncing"], serde_json::Value::Null);

    // Without Corona the export can only filter by createdAt.
    let creates: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/create.json"))
        .collect();
    assert_eq!(creates.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&creates[0].body).unwrap();
    assert_eq!(body["format"], "CSV");
    assert!(body["filter"]["createdAt"]["startAt"].is_string());
    assert!(body["filter"]["createdAt"]["endAt"].is_string());
    assert_eq!(
        body["fields"],
        json!(["email", "id", "updatedAt"]),
        "export requests the selected fields in sorted order"
    );
}

// ============================================================================
// REST Pagination End to End
// ============================================================================

#[tokio::test]
async fn test_campaigns_sync_pages_through_rest_api() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // Mounted first so the token-bearing second page matches it before the
    // catch-all page-one mock below.
    Mock::given(method("GET"))
        .and(path("/rest/v1/campaigns.json"))
        .and(query_param("nextPageToken", "tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"id": 2, "name": "second", "updatedAt": "2021-02-01T00:00:00Z"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/campaigns.json"))
        .and(query_param("batchSize", "300"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "nextPageToken": "tok-2",
            "result": [{"id": 1, "name": "first", "updatedAt": "2021-01-01T00:00:00Z"}]
        })))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let client = Arc::new(HttpMarketoClient::new(config.clone()).unwrap());

    let (output, capture) = OutputChannel::in_memory();
    let mut syncer = Syncer::new(client, campaigns_catalog(), &config, State::new(), output);
    syncer.run().await.unwrap();

    let ids: Vec<i64> = capture
        .records_for("campaigns")
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [1, 2]);

    // The bookmark landed and the page token did not outlive the sync.
    let last = capture.last_state().unwrap();
    assert!(last["bookmarks"]["campaigns"].get("next_page_token").is_none());
    assert!(last["bookmarks"]["campaigns"]["updatedAt"].is_string());
}

// ============================================================================
// API Error Propagation
// ============================================================================

#[tokio::test]
async fn test_api_error_envelope_fails_the_sync() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/campaigns.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{"code": "1003", "message": "access denied"}]
        })))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let client = Arc::new(HttpMarketoClient::new(config.clone()).unwrap());

    let (output, capture) = OutputChannel::in_memory();
    let mut syncer = Syncer::new(client, campaigns_catalog(), &config, State::new(), output);
    let err = syncer.run().await.unwrap_err();
    assert!(err.to_string().contains("1003"));

    // The interrupted stream stays marked so the next run resumes it.
    let last = capture.last_state().unwrap();
    assert_eq!(last["currently_syncing"], "campaigns");
}
