//! Bulk export pipeline
//!
//! Marketo serves leads and activities through asynchronous bulk export
//! jobs that produce CSV files. This module owns both halves of that
//! pipeline: the window math and create-or-resume bookkeeping for the jobs
//! themselves, and a pull-based row stream that downloads a finished file
//! in byte ranges and decodes it incrementally.

mod job;
mod rows;

pub use job::{
    export_window_end, get_or_create_activities_export, get_or_create_leads_export, ExportJob,
    ATTRIBUTION_WINDOW_DAYS, MAX_EXPORT_DAYS,
};
pub use rows::ExportRowStream;
