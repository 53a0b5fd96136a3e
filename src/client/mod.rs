//! Marketo API client module
//!
//! The sync core consumes the API through the [`MarketoClient`] trait:
//! plain REST requests, raw byte downloads, bulk export creation, and
//! blocking waits on export completion. `HttpMarketoClient` is the
//! production implementation over OAuth2 client credentials, retries, and
//! Marketo's documented rate budget; tests substitute scripted fakes.

mod http;
mod rate_limit;

pub use http::HttpMarketoClient;
pub use rate_limit::{RateLimiter, RateLimiterConfig};

use crate::error::Result;
use crate::types::{JsonValue, Method, StringMap};
use async_trait::async_trait;
use bytes::Bytes;


// ============================================================================
// Resource Kinds and Actions
// ============================================================================

/// Resource kinds served by the bulk export API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Leads,
    Activities,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leads => "leads",
            Self::Activities => "activities",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions addressable on a bulk export job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Create,
    Enqueue,
    Status,
    File,
    Cancel,
}

impl BulkAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Enqueue => "enqueue",
            Self::Status => "status",
            Self::File => "file",
            Self::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for BulkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Client Trait
// ============================================================================

/// The API surface the sync core needs
#[async_trait]
pub trait MarketoClient: Send + Sync {
    /// Whether the account has Corona (incremental lead export) support
    fn use_corona(&self) -> bool;

    /// Build a bulk export path for a resource kind and action.
    ///
    /// `create` takes no export id; every other action addresses one.
    fn bulk_endpoint(
        &self,
        kind: ResourceKind,
        action: BulkAction,
        export_id: Option<&str>,
    ) -> String {
        match export_id {
            Some(id) => format!("bulk/v1/{kind}/export/{id}/{action}.json"),
            None => format!("bulk/v1/{kind}/export/{action}.json"),
        }
    }

    /// Issue a REST request and return the parsed JSON body
    async fn request(&self, method: Method, path: &str, params: &StringMap) -> Result<JsonValue>;

    /// Issue a request with extra headers and return the raw body bytes
    async fn raw_request(&self, method: Method, path: &str, headers: &StringMap) -> Result<Bytes>;

    /// Create a bulk export job, returning its export id.
    ///
    /// Creation does not start the job; that happens on enqueue during
    /// [`MarketoClient::wait_for_export`].
    async fn create_export(
        &self,
        kind: ResourceKind,
        fields: &[String],
        query: JsonValue,
    ) -> Result<String>;

    /// Block until an export reaches a terminal state, erring with
    /// `Error::ExportFailed` on anything but completion
    async fn wait_for_export(&self, kind: ResourceKind, export_id: &str) -> Result<()>;
}
