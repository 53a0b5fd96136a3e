//! REST-paginated stream strategies
//!
//! Activity types, campaigns, lists, and programs come straight from the
//! REST API rather than bulk exports: one unpaginated fetch, a page-token
//! loop, and an offset loop respectively.

use chrono::{DateTime, Utc};

use super::{Syncer, NO_ASSET_MSG};
use crate::catalog::Stream;
use crate::error::{Error, Result};
use crate::record::{format_record, format_timestamp, parse_timestamp};
use crate::types::{JsonValue, Method, Row, StringMap};

/// Page size for token-paginated REST endpoints
const PAGINATED_BATCH_SIZE: u32 = 300;

/// Page size for the offset-paginated asset API
const PROGRAMS_PAGE_SIZE: u64 = 200;

impl Syncer {
    /// Fetch the activity-type catalog in a single request
    pub(super) async fn sync_activity_types(&mut self, stream: &Stream) -> Result<usize> {
        self.write_schema(stream)?;
        let mut data = self
            .client
            .request(
                Method::GET,
                "rest/v1/activities/types.json",
                &StringMap::new(),
            )
            .await?;

        let mut count = 0;
        for row in take_result_rows(&mut data)? {
            let record = format_record(stream, &row)?;
            self.output.write_record(&stream.tap_stream_id, record)?;
            count += 1;
        }
        Ok(count)
    }

    /// Sync a token-paginated stream such as campaigns or lists
    pub(super) async fn sync_paginated(&mut self, stream: &Stream) -> Result<usize> {
        self.write_schema(stream)?;
        let stream_id = stream.tap_stream_id.clone();
        let replication_key = stream.require_replication_key()?.to_string();
        let start = self.cursor_or_start(&stream_id, &replication_key)?;

        let endpoint = format!("rest/v1/{stream_id}.json");
        let mut params = StringMap::new();
        params.insert("batchSize".to_string(), PAGINATED_BATCH_SIZE.to_string());

        // A token left by an interrupted run picks pagination back up where
        // it stopped.
        if let Some(token) = self.state.next_page_token(&stream_id) {
            params.insert("nextPageToken".to_string(), token.to_string());
        }

        let job_started = Utc::now();
        let mut record_count = 0;
        loop {
            let mut data = self.client.request(Method::GET, &endpoint, &params).await?;

            for row in take_result_rows(&mut data)? {
                let record = format_record(stream, &row)?;
                if replication_value(&record, &replication_key)? >= start {
                    self.output.write_record(&stream_id, record)?;
                    record_count += 1;
                }
            }

            let token = match data["nextPageToken"].as_str() {
                Some(token) => token.to_string(),
                None => break,
            };
            params.insert("nextPageToken".to_string(), token.clone());
            self.state.set_next_page_token(&stream_id, Some(&token))?;
        }

        // The endpoint cannot filter by time, so the bookmark is the time
        // this pass started; anything mutated mid-pass is re-read next sync.
        self.state.set_cursor_and_clear_page_token(
            &stream_id,
            &replication_key,
            format_timestamp(&job_started),
        )?;
        Ok(record_count)
    }

    /// Sync the programs stream through the offset-paginated asset API
    pub(super) async fn sync_programs(&mut self, stream: &Stream) -> Result<usize> {
        self.write_schema(stream)?;
        let stream_id = stream.tap_stream_id.clone();
        let replication_key = stream.require_replication_key()?.to_string();
        let start = self.cursor_or_start(&stream_id, &replication_key)?;
        let end = Utc::now();

        let mut params = StringMap::new();
        params.insert("maxReturn".to_string(), PROGRAMS_PAGE_SIZE.to_string());
        params.insert("offset".to_string(), "0".to_string());
        params.insert("earliestUpdatedAt".to_string(), format_timestamp(&start));
        params.insert("latestUpdatedAt".to_string(), format_timestamp(&end));

        let mut offset = 0u64;
        let mut record_count = 0;
        loop {
            let mut data = self
                .client
                .request(Method::GET, "rest/asset/v1/programs.json", &params)
                .await?;

            // Paging past the last program yields a warning, not an empty
            // result array.
            if has_no_asset_warning(&data) {
                break;
            }

            for row in take_result_rows(&mut data)? {
                let record = format_record(stream, &row)?;
                if replication_value(&record, &replication_key)? >= start {
                    self.output.write_record(&stream_id, record)?;
                    record_count += 1;
                }
            }

            offset += PROGRAMS_PAGE_SIZE;
            params.insert("offset".to_string(), offset.to_string());
        }

        self.state
            .set_cursor(&stream_id, &replication_key, format_timestamp(&end))?;
        Ok(record_count)
    }
}

fn take_result_rows(data: &mut JsonValue) -> Result<Vec<Row>> {
    match data.get_mut("result") {
        Some(result) => Ok(serde_json::from_value(result.take())?),
        None => Ok(Vec::new()),
    }
}

fn has_no_asset_warning(data: &JsonValue) -> bool {
    data["warnings"]
        .as_array()
        .is_some_and(|warnings| warnings.iter().any(|w| w == NO_ASSET_MSG))
}

/// A missing replication value would silently drop the row from every
/// incremental sync, so it errors instead.
fn replication_value(record: &Row, replication_key: &str) -> Result<DateTime<Utc>> {
    let raw = record
        .get(replication_key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| {
            Error::value_format(replication_key, "record carries no replication value")
        })?;
    parse_timestamp(raw)
}
