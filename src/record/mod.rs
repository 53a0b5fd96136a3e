//! Record shaping module
//!
//! Bulk extract rows arrive as flat string maps and REST pages arrive as
//! typed JSON, but both leave here in the same shape: a record holding only
//! the selected schema fields, each coerced to its declared type.
//!
//! # Overview
//!
//! The record module provides:
//! - `format_value` / `format_record` - Schema-driven type coercion
//! - `flatten_activity` - Expansion of the nested activity attribute blob
//! - Timestamp parsing and canonical ISO-8601 rendering

mod activity;
mod format;

pub use activity::{flatten_activity, ACTIVITY_EXPORT_FIELDS, BASE_ACTIVITY_FIELDS};
pub use format::{format_record, format_timestamp, format_value, parse_timestamp};
