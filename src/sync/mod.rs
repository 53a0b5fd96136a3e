//! Sync orchestration
//!
//! One [`Syncer`] drives a whole run: it walks the catalog in order,
//! resumes from the `currently_syncing` marker after a crash, dispatches
//! each selected stream to the strategy resolved at catalog load, and
//! emits a record-count metric as each stream finishes.

mod exports;
mod paginated;


use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::catalog::{Catalog, Stream, SyncStrategy};
use crate::client::MarketoClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{record_counter, OutputChannel};
use crate::record::parse_timestamp;
use crate::state::{State, StateStore};

/// Warning emitted after every sync for accounts without Corona support
pub const NO_CORONA_WARNING: &str =
    "Your account does not have Corona support enabled. Without Corona, each sync of \
     the Leads table requires a full export which can lead to lower data freshness. \
     Please contact Marketo to request Corona support be added to your account.";

/// Message the asset API returns when a query pages past its last result
pub const NO_ASSET_MSG: &str = "No assets found for the given search criteria.";

/// Drives one end-to-end sync over a catalog
pub struct Syncer {
    client: Arc<dyn MarketoClient>,
    catalog: Catalog,
    output: OutputChannel,
    state: StateStore,
    start_date: DateTime<Utc>,
    chunk_size: u64,
}

impl Syncer {
    pub fn new(
        client: Arc<dyn MarketoClient>,
        catalog: Catalog,
        config: &Config,
        state: State,
        output: OutputChannel,
    ) -> Self {
        Self {
            client,
            catalog,
            state: StateStore::new(state, output.clone()),
            output,
            start_date: config.start_date,
            chunk_size: config.export_chunk_size,
        }
    }

    /// Sync every selected stream in catalog order.
    ///
    /// The stream named by `currently_syncing` (if any) was interrupted
    /// mid-sync; streams before it in the catalog already finished and are
    /// skipped, and it picks back up from its persisted bookmarks.
    pub async fn run(&mut self) -> Result<()> {
        let mut resume_point = self.state.currently_syncing().map(str::to_string);
        match &resume_point {
            Some(stream_id) => info!("Resuming sync from {stream_id}"),
            None => info!("Starting sync"),
        }

        let streams = self.catalog.streams.clone();
        for stream in &streams {
            let stream_id = stream.tap_stream_id.as_str();

            if !stream.is_selected() {
                info!("{stream_id}: not selected");
                continue;
            }
            if let Some(resume) = &resume_point {
                if stream_id != resume {
                    info!("{stream_id}: already synced");
                    continue;
                }
            }
            resume_point = None;

            info!("{stream_id}: starting sync");
            self.state.set_currently_syncing(Some(stream_id))?;

            let record_count = match stream.strategy() {
                SyncStrategy::ActivityTypes => self.sync_activity_types(stream).await?,
                SyncStrategy::LeadExport => self.sync_leads(stream).await?,
                SyncStrategy::ActivityExport => self.sync_activities(stream).await?,
                SyncStrategy::TokenPaginated => self.sync_paginated(stream).await?,
                SyncStrategy::OffsetPaginated => self.sync_programs(stream).await?,
                SyncStrategy::Unsupported => return Err(Error::unsupported_stream(stream_id)),
            };
            record_counter(stream_id, record_count);

            self.state.set_currently_syncing(None)?;
            info!("{stream_id}: finished sync");
        }

        info!("Performing final Corona check");
        info!("Finished sync");
        if !self.client.use_corona() {
            warn!("{NO_CORONA_WARNING}");
        }
        Ok(())
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    fn write_schema(&self, stream: &Stream) -> Result<()> {
        let schema = serde_json::to_value(&stream.schema)?;
        self.output
            .write_schema(&stream.tap_stream_id, schema, &stream.key_properties)
    }

    /// The stream's bookmark under `key`, or the configured start date if
    /// it has never synced
    fn cursor_or_start(&self, stream_id: &str, key: &str) -> Result<DateTime<Utc>> {
        match self.state.cursor(stream_id, key) {
            Some(raw) => parse_timestamp(raw),
            None => Ok(self.start_date),
        }
    }
}
