//! Schema-driven value formatting

use crate::catalog::{FieldSchema, Stream};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Row};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a timestamp in any of the forms the API hands back: RFC 3339 with
/// `Z` or a numeric offset, a naive `T` or space-separated datetime taken as
/// UTC, or a bare date.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(Error::timestamp(value))
}

/// Render a timestamp in the canonical form bookmarks and records carry:
/// ISO-8601 with an explicit `+00:00` offset
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

/// Coerce one raw value to the type its schema declares.
///
/// Empty strings, the literal string `"null"`, JSON null, and absent values
/// all become null. A `date-time` format wins over the declared types and
/// re-emits the canonical timestamp form. Otherwise the first declared type
/// among integer, string, number, and boolean decides the coercion, and a
/// schema declaring none of those passes the value through untouched.
pub fn format_value(
    field: &str,
    value: Option<&JsonValue>,
    schema: &FieldSchema,
) -> Result<JsonValue> {
    let value = match value {
        None | Some(JsonValue::Null) => return Ok(JsonValue::Null),
        Some(value) => value,
    };
    if let JsonValue::String(raw) = value {
        if raw.is_empty() || raw == "null" {
            return Ok(JsonValue::Null);
        }
    }

    if schema.is_date_time() {
        return match value {
            JsonValue::String(raw) => {
                Ok(JsonValue::String(format_timestamp(&parse_timestamp(raw)?)))
            }
            other => Err(Error::value_format(
                field,
                format!("expected a date-time string, got {other}"),
            )),
        };
    }

    if schema.field_type.includes("integer") {
        return format_integer(field, value);
    }
    if schema.field_type.includes("string") {
        return Ok(match value {
            JsonValue::String(raw) => JsonValue::String(raw.clone()),
            other => JsonValue::String(other.to_string()),
        });
    }
    if schema.field_type.includes("number") {
        return format_number(field, value);
    }
    if schema.field_type.includes("boolean") {
        return format_boolean(field, value);
    }

    Ok(value.clone())
}

/// Format a row into a record holding every selected-or-automatic schema
/// field, with fields missing from the row carried as null
pub fn format_record(stream: &Stream, row: &Row) -> Result<Row> {
    let mut record = Row::new();
    for (field, schema) in &stream.schema.properties {
        if !schema.is_selected() {
            continue;
        }
        record.insert(field.clone(), format_value(field, row.get(field), schema)?);
    }
    Ok(record)
}

fn format_integer(field: &str, value: &JsonValue) -> Result<JsonValue> {
    match value {
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        JsonValue::Number(n) => {
            // Fractional values under an integer schema truncate toward zero
            #[allow(clippy::cast_possible_truncation)]
            let truncated = n.as_f64().unwrap_or_default().trunc() as i64;
            Ok(JsonValue::from(truncated))
        }
        JsonValue::String(raw) => raw.trim().parse::<i64>().map(JsonValue::from).map_err(|_| {
            Error::value_format(field, format!("cannot parse {raw:?} as an integer"))
        }),
        other => Err(Error::value_format(
            field,
            format!("cannot coerce {other} to an integer"),
        )),
    }
}

fn format_number(field: &str, value: &JsonValue) -> Result<JsonValue> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .ok_or_else(|| Error::value_format(field, format!("cannot parse {value} as a number")))
}

fn format_boolean(field: &str, value: &JsonValue) -> Result<JsonValue> {
    match value {
        JsonValue::Bool(_) => Ok(value.clone()),
        JsonValue::String(raw) => Ok(JsonValue::Bool(raw.eq_ignore_ascii_case("true"))),
        other => Err(Error::value_format(
            field,
            format!("cannot coerce {other} to a boolean"),
        )),
    }
}
