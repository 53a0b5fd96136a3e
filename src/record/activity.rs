//! Activity record flattening
//!
//! Activity exports carry a fixed column set: the base identity fields, the
//! primary attribute value pair, and an `attributes` column holding all other
//! attributes as a JSON object. Flattening lifts those nested attributes into
//! top-level columns before formatting.

use crate::catalog::Stream;
use crate::error::{Error, Result};
use crate::types::{JsonValue, Row};

/// Fields every flattened activity record carries directly
pub const BASE_ACTIVITY_FIELDS: [&str; 4] =
    ["marketoGUID", "leadId", "activityDate", "activityTypeId"];

/// Columns requested for every activity bulk export
pub const ACTIVITY_EXPORT_FIELDS: [&str; 7] = [
    "marketoGUID",
    "leadId",
    "activityDate",
    "activityTypeId",
    "primaryAttributeValue",
    "primaryAttributeValueId",
    "attributes",
];

/// Flatten one raw activity row.
///
/// The primary attribute triple is emitted only when the stream's metadata
/// names the attribute; the name itself comes from metadata, not the row.
/// Attribute keys are lower-cased with spaces turned into underscores.
pub fn flatten_activity(stream: &Stream, row: &Row) -> Result<Row> {
    let mut flat = Row::new();
    for field in BASE_ACTIVITY_FIELDS {
        flat.insert(
            field.to_string(),
            row.get(field).cloned().unwrap_or(JsonValue::Null),
        );
    }

    if let Some(name) = stream.primary_attribute_name() {
        flat.insert(
            "primary_attribute_name".to_string(),
            JsonValue::String(name.to_string()),
        );
        flat.insert(
            "primary_attribute_value".to_string(),
            row.get("primaryAttributeValue")
                .cloned()
                .unwrap_or(JsonValue::Null),
        );
        flat.insert(
            "primary_attribute_value_id".to_string(),
            row.get("primaryAttributeValueId")
                .cloned()
                .unwrap_or(JsonValue::Null),
        );
    }

    if let Some(attributes) = row.get("attributes") {
        let parsed = match attributes {
            JsonValue::String(raw) => serde_json::from_str(raw).map_err(|e| {
                Error::value_format("attributes", format!("column is not valid JSON: {e}"))
            })?,
            other => other.clone(),
        };
        match parsed {
            JsonValue::Object(entries) => {
                for (key, value) in entries {
                    flat.insert(key.to_lowercase().replace(' ', "_"), value);
                }
            }
            other => {
                return Err(Error::value_format(
                    "attributes",
                    format!("column must hold a JSON object, got {other}"),
                ))
            }
        }
    }

    Ok(flat)
}
