//! Bulk-export stream strategies
//!
//! Leads and activities sync through the bulk extract API in windows of at
//! most thirty days. Each window's export id and end ride in state so a run
//! that dies mid-window resumes the same job instead of creating another;
//! a window whose export fails terminally is retried with a fresh export.

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::{error, info};

use super::Syncer;
use crate::catalog::Stream;
use crate::client::ResourceKind;
use crate::error::Result;
use crate::export::{
    get_or_create_activities_export, get_or_create_leads_export, ExportJob, ExportRowStream,
    ATTRIBUTION_WINDOW_DAYS,
};
use crate::record::{flatten_activity, format_record, format_timestamp, parse_timestamp};
use crate::types::{JsonValue, Row};

impl Syncer {
    /// Sync the leads stream window by window.
    ///
    /// Without Corona the export window can only filter on `createdAt`, so
    /// every window re-exports old leads and the rows are filtered against
    /// the original bookmark here instead.
    pub(super) async fn sync_leads(&mut self, stream: &Stream) -> Result<usize> {
        self.write_schema(stream)?;
        let stream_id = stream.tap_stream_id.clone();
        let replication_key = stream.require_replication_key()?.to_string();
        let fields = stream.selected_field_names();

        // Back up by the attribution window so leads whose attribution data
        // arrived after the last sync read them are re-captured.
        let og_bookmark = self.cursor_or_start(&stream_id, &replication_key)?;
        let mut export_start = og_bookmark - Duration::days(ATTRIBUTION_WINDOW_DAYS);

        let job_started = sync_start_time();
        let mut record_count = 0;
        while export_start < job_started {
            let job = get_or_create_leads_export(
                self.client.as_ref(),
                &mut self.state,
                stream,
                &fields,
                export_start,
                job_started,
            )
            .await?;

            if !self
                .await_export(ResourceKind::Leads, &stream_id, &job)
                .await?
            {
                continue;
            }

            match self.stream_lead_rows(stream, &job, og_bookmark).await {
                Ok(count) => record_count += count,
                Err(e) => {
                    info!(
                        "Exception while writing leads record, \
                         removing export information from state"
                    );
                    self.state.clear_export(&stream_id)?;
                    return Err(e);
                }
            }

            if self.client.use_corona() {
                self.state.set_cursor_and_clear_export(
                    &stream_id,
                    &replication_key,
                    format_timestamp(&job.export_end),
                )?;
            } else {
                self.state.clear_export(&stream_id)?;
            }
            export_start = job.export_end;
        }

        // Without Corona the bookmark only moves here, once the whole
        // backlog has been read.
        self.state.set_cursor_and_clear_export(
            &stream_id,
            &replication_key,
            format_timestamp(&export_start),
        )?;
        Ok(record_count)
    }

    /// Sync one activity stream window by window
    pub(super) async fn sync_activities(&mut self, stream: &Stream) -> Result<usize> {
        self.write_schema(stream)?;
        let stream_id = stream.tap_stream_id.clone();
        let replication_key = stream.require_replication_key()?.to_string();

        let mut start = self.cursor_or_start(&stream_id, &replication_key)?;
        let job_started = sync_start_time();
        let mut record_count = 0;
        while start < job_started {
            let job = get_or_create_activities_export(
                self.client.as_ref(),
                &mut self.state,
                stream,
                start,
                job_started,
            )
            .await?;

            if !self
                .await_export(ResourceKind::Activities, &stream_id, &job)
                .await?
            {
                continue;
            }

            match self.stream_activity_rows(stream, &job).await {
                Ok(count) => record_count += count,
                Err(e) => {
                    info!(
                        "Exception while writing activity \"{stream_id}\" record, \
                         removing export information from state"
                    );
                    self.state.clear_export(&stream_id)?;
                    return Err(e);
                }
            }

            self.state.set_cursor_and_clear_export(
                &stream_id,
                &replication_key,
                format_timestamp(&job.export_end),
            )?;
            start = job.export_end;
        }

        Ok(record_count)
    }

    /// Wait for an export to reach a terminal state.
    ///
    /// Returns `false` when the export failed terminally: its state markers
    /// are cleared so the next loop iteration retries the same window with
    /// a fresh export. Transport errors propagate as-is.
    async fn await_export(
        &mut self,
        kind: ResourceKind,
        stream_id: &str,
        job: &ExportJob,
    ) -> Result<bool> {
        match self.client.wait_for_export(kind, &job.export_id).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_export_failure() => {
                error!("Export job failure. Status was {e}");
                self.state.clear_export(stream_id)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn stream_lead_rows(
        &self,
        stream: &Stream,
        job: &ExportJob,
        og_bookmark: DateTime<Utc>,
    ) -> Result<usize> {
        let mut rows = ExportRowStream::open(
            self.client.as_ref(),
            ResourceKind::Leads,
            &job.export_id,
            self.chunk_size,
        )
        .await?;

        let replication_key = stream.require_replication_key()?;
        let corona = self.client.use_corona();
        let mut count = 0;
        while let Some(row) = rows.next_row().await? {
            let record = format_record(stream, &row)?;
            if corona || lead_is_new_enough(&record, replication_key, og_bookmark)? {
                self.output.write_record(&stream.tap_stream_id, record)?;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn stream_activity_rows(&self, stream: &Stream, job: &ExportJob) -> Result<usize> {
        let mut rows = ExportRowStream::open(
            self.client.as_ref(),
            ResourceKind::Activities,
            &job.export_id,
            self.chunk_size,
        )
        .await?;

        let mut count = 0;
        while let Some(row) = rows.next_row().await? {
            let flattened = flatten_activity(stream, &row)?;
            let record = format_record(stream, &flattened)?;
            self.output.write_record(&stream.tap_stream_id, record)?;
            count += 1;
        }
        Ok(count)
    }
}

/// When the sync began, at the whole-second precision export windows use.
/// Windows are capped at this instant, so the window loops always close the
/// backlog they started with.
fn sync_start_time() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Rows with no replication value cannot be compared and are kept.
fn lead_is_new_enough(
    record: &Row,
    replication_key: &str,
    og_bookmark: DateTime<Utc>,
) -> Result<bool> {
    match record.get(replication_key).and_then(JsonValue::as_str) {
        Some(value) => Ok(parse_timestamp(value)? >= og_bookmark),
        None => Ok(true),
    }
}
