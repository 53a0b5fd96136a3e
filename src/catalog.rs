//! Catalog and stream definitions
//!
//! The catalog is a JSON document listing every stream the account exposes:
//! its schema (field name → type/format/selection flags), key properties,
//! replication key, and catalog metadata entries. Streams are read-only during
//! a sync run.
//!
//! Each stream's sync strategy is resolved once while the catalog is
//! deserialized, so the orchestrator dispatches on an enum instead of
//! re-matching stream-id strings.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// Sync Strategy
// ============================================================================

/// How a stream is synced, resolved from its `tap_stream_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStrategy {
    /// Single unpaginated fetch of the activity-type catalog
    ActivityTypes,
    /// Bulk-export window loop over lead records
    LeadExport,
    /// Bulk-export window loop over one activity type
    ActivityExport,
    /// Page-token loop against the REST API (campaigns, lists)
    TokenPaginated,
    /// Offset loop against the asset API (programs)
    OffsetPaginated,
    /// No known strategy; fatal if the stream is selected
    #[default]
    Unsupported,
}

impl SyncStrategy {
    /// Resolve the strategy for a stream id
    pub fn for_stream(tap_stream_id: &str) -> Self {
        match tap_stream_id {
            "activity_types" => Self::ActivityTypes,
            "leads" => Self::LeadExport,
            "campaigns" | "lists" => Self::TokenPaginated,
            "programs" => Self::OffsetPaginated,
            id if id.starts_with("activities_") => Self::ActivityExport,
            _ => Self::Unsupported,
        }
    }
}

// ============================================================================
// Field Schema
// ============================================================================

/// Declared JSON-schema type(s) for a field
///
/// Catalogs write either a single string (`"string"`) or a list
/// (`["null", "string"]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDecl {
    One(String),
    Many(Vec<String>),
}

impl Default for TypeDecl {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl TypeDecl {
    /// Whether the declaration includes the given type name
    pub fn includes(&self, type_name: &str) -> bool {
        match self {
            Self::One(t) => t == type_name,
            Self::Many(ts) => ts.iter().any(|t| t == type_name),
        }
    }
}

/// Field-level inclusion flag from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inclusion {
    Available,
    Automatic,
    Unsupported,
}

/// Schema entry for a single field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Declared type(s)
    #[serde(rename = "type", default)]
    pub field_type: TypeDecl,

    /// Format hint (`date-time` drives timestamp normalization)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Whether the user selected this field
    #[serde(default)]
    pub selected: bool,

    /// Inclusion flag; `automatic` fields are always emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<Inclusion>,

    /// Unmodeled schema keys, preserved for schema emission
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl FieldSchema {
    /// Whether this field is emitted in records
    pub fn is_selected(&self) -> bool {
        self.selected || self.inclusion == Some(Inclusion::Automatic)
    }

    /// Whether values should be normalized as timestamps
    pub fn is_date_time(&self) -> bool {
        self.format.as_deref() == Some("date-time")
    }
}

// ============================================================================
// Stream Schema
// ============================================================================

/// Object schema for a stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSchema {
    /// Whether the stream itself is selected for sync
    #[serde(default)]
    pub selected: bool,

    /// Field schemas by field name
    #[serde(default)]
    pub properties: HashMap<String, FieldSchema>,

    /// Unmodeled schema keys (`type`, `additionalProperties`, ...)
    #[serde(flatten)]
    pub extra: JsonObject,
}

// ============================================================================
// Metadata
// ============================================================================

/// One catalog metadata entry
///
/// The entry with an empty breadcrumb holds stream-level metadata such as
/// `marketo.activity-id` and `marketo.primary-attribute-name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(default)]
    pub breadcrumb: Vec<String>,

    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
}

// ============================================================================
// Stream
// ============================================================================

/// A single catalog stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StreamDef")]
pub struct Stream {
    /// Unique stream id used for dispatch, state keys, and messages
    pub tap_stream_id: String,

    /// Display name; defaults to the stream id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    /// Object schema with per-field selection flags
    pub schema: StreamSchema,

    /// Primary-key field names
    #[serde(default)]
    pub key_properties: Vec<String>,

    /// Field used for incremental bookmarking, when the stream has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Catalog metadata entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataEntry>,

    #[serde(skip)]
    strategy: SyncStrategy,
}

/// Mirror of [`Stream`] used during deserialization so the sync strategy is
/// resolved exactly once, at catalog load.
#[derive(Debug, Deserialize)]
struct StreamDef {
    tap_stream_id: String,
    #[serde(default)]
    stream: Option<String>,
    #[serde(default)]
    schema: StreamSchema,
    #[serde(default)]
    key_properties: Vec<String>,
    #[serde(default)]
    replication_key: Option<String>,
    #[serde(default)]
    metadata: Vec<MetadataEntry>,
}

impl From<StreamDef> for Stream {
    fn from(def: StreamDef) -> Self {
        let strategy = SyncStrategy::for_stream(&def.tap_stream_id);
        Self {
            tap_stream_id: def.tap_stream_id,
            stream: def.stream,
            schema: def.schema,
            key_properties: def.key_properties,
            replication_key: def.replication_key,
            metadata: def.metadata,
            strategy,
        }
    }
}

impl Stream {
    /// The strategy resolved at catalog load
    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    /// Whether the stream is selected for sync
    pub fn is_selected(&self) -> bool {
        self.schema.selected
    }

    /// Display name for log lines
    pub fn name(&self) -> &str {
        self.stream.as_deref().unwrap_or(&self.tap_stream_id)
    }

    /// The replication key, or a catalog error naming the stream
    pub fn require_replication_key(&self) -> Result<&str> {
        self.replication_key.as_deref().ok_or_else(|| {
            Error::catalog(format!(
                "Stream '{}' has no replication key",
                self.tap_stream_id
            ))
        })
    }

    /// Names of all selected-or-automatic fields, for export field lists
    pub fn selected_field_names(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .schema
            .properties
            .iter()
            .filter(|(_, schema)| schema.is_selected())
            .map(|(name, _)| name.clone())
            .collect();
        fields.sort();
        fields
    }

    /// Stream-level metadata value (entry with an empty breadcrumb)
    pub fn stream_metadata(&self, key: &str) -> Option<&JsonValue> {
        self.metadata
            .iter()
            .find(|entry| entry.breadcrumb.is_empty())
            .and_then(|entry| entry.metadata.get(key))
    }

    /// The `marketo.activity-id` metadata, if present
    ///
    /// Catalog generators write it as either a number or a numeric string.
    pub fn activity_type_id(&self) -> Option<i64> {
        match self.stream_metadata("marketo.activity-id")? {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The `marketo.primary-attribute-name` metadata, if present
    pub fn primary_attribute_name(&self) -> Option<&str> {
        self.stream_metadata("marketo.primary-attribute-name")?
            .as_str()
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// A parsed catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub streams: Vec<Stream>,
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::catalog(format!("Failed to read catalog file: {e}")))?;
        Self::from_json(&content)
    }

    /// Parse a catalog from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::catalog(format!("Invalid catalog: {e}")))
    }

    /// Look up a stream by id
    pub fn get_stream(&self, tap_stream_id: &str) -> Option<&Stream> {
        self.streams
            .iter()
            .find(|s| s.tap_stream_id == tap_stream_id)
    }
}
