//! Export job windows and create-or-resume bookkeeping
//!
//! An export covers at most thirty days, so a long backlog is worked off as
//! a sequence of window-sized jobs. The id and window end of the job in
//! flight live in state; a sync that died mid-job picks the same job back up
//! instead of paying for a fresh export.

use crate::catalog::Stream;
use crate::client::{MarketoClient, ResourceKind};
use crate::error::{Error, Result};
use crate::record::{format_timestamp, parse_timestamp, ACTIVITY_EXPORT_FIELDS};
use crate::state::StateStore;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde_json::json;
use tracing::{debug, info};

/// Largest date range one bulk export may cover
pub const MAX_EXPORT_DAYS: i64 = 30;

/// Days the leads bookmark is rewound so late attribution updates are
/// re-read on the next sync
pub const ATTRIBUTION_WINDOW_DAYS: i64 = 1;

/// A bulk export job together with the window end it covers
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub export_id: String,
    pub export_end: DateTime<Utc>,
}

/// End of the export window opening at `start`: thirty days out, capped at
/// `bound`, with sub-second precision dropped to match the API's timestamp
/// granularity.
///
/// Capping at the sync's own start time (rather than re-reading the clock)
/// makes the windows tile `[start, bound]` exactly, so the window loop
/// always terminates.
pub fn export_window_end(start: DateTime<Utc>, bound: DateTime<Utc>) -> DateTime<Utc> {
    let mut end = start + Duration::days(MAX_EXPORT_DAYS);
    if end >= bound {
        end = bound;
    }
    end.with_nanosecond(0).unwrap_or(end)
}

/// The persisted in-flight export for a stream, if any
fn resume_export(state: &StateStore, stream_id: &str) -> Result<Option<ExportJob>> {
    let export_id = match state.export_id(stream_id) {
        Some(id) => id.to_string(),
        None => return Ok(None),
    };
    let export_end = state.export_end(stream_id).ok_or_else(|| {
        Error::state(format!(
            "stream '{stream_id}' has an export id but no export end"
        ))
    })?;

    debug!(stream = stream_id, export_id, "resuming in-flight export");
    Ok(Some(ExportJob {
        export_id,
        export_end: parse_timestamp(export_end)?,
    }))
}

/// Resume the persisted leads export if one is in flight, otherwise create
/// one covering the window opening at `start`.
///
/// Corona accounts filter the export by `updatedAt`; accounts without it can
/// only filter by `createdAt` and so re-export every lead each sync.
pub async fn get_or_create_leads_export(
    client: &dyn MarketoClient,
    state: &mut StateStore,
    stream: &Stream,
    fields: &[String],
    start: DateTime<Utc>,
    bound: DateTime<Utc>,
) -> Result<ExportJob> {
    let stream_id = &stream.tap_stream_id;
    if let Some(job) = resume_export(state, stream_id)? {
        return Ok(job);
    }

    let query_field = if client.use_corona() {
        "updatedAt"
    } else {
        "createdAt"
    };
    let export_end = export_window_end(start, bound);
    let query = json!({
        query_field: {
            "startAt": format_timestamp(&start),
            "endAt": format_timestamp(&export_end),
        }
    });

    // Creation does not start the job; the wait loop enqueues it.
    let export_id = client
        .create_export(ResourceKind::Leads, fields, query)
        .await?;
    state.set_export(stream_id, &export_id, &format_timestamp(&export_end))?;

    Ok(ExportJob {
        export_id,
        export_end,
    })
}

/// Resume the persisted activities export if one is in flight, otherwise
/// create one covering the window opening at `start`.
pub async fn get_or_create_activities_export(
    client: &dyn MarketoClient,
    state: &mut StateStore,
    stream: &Stream,
    start: DateTime<Utc>,
    bound: DateTime<Utc>,
) -> Result<ExportJob> {
    let stream_id = &stream.tap_stream_id;
    if let Some(job) = resume_export(state, stream_id)? {
        return Ok(job);
    }

    let activity_type_id = stream.activity_type_id().ok_or_else(|| {
        Error::catalog(format!(
            "Stream '{stream_id}' carries no marketo.activity-id metadata"
        ))
    })?;
    info!(
        stream = stream_id,
        activity_type_id, "resolved activity type id"
    );

    // Activity exports are queried by createdAt, which proxies activityDate,
    // and must name the activity type they cover.
    let export_end = export_window_end(start, bound);
    let query = json!({
        "createdAt": {
            "startAt": format_timestamp(&start),
            "endAt": format_timestamp(&export_end),
        },
        "activityTypeIds": [activity_type_id],
    });
    info!(stream = stream_id, %query, "scheduling activities export");

    let fields: Vec<String> = ACTIVITY_EXPORT_FIELDS
        .iter()
        .map(|field| (*field).to_string())
        .collect();
    let export_id = client
        .create_export(ResourceKind::Activities, &fields, query)
        .await?;
    state.set_export(stream_id, &export_id, &format_timestamp(&export_end))?;

    Ok(ExportJob {
        export_id,
        export_end,
    })
}
