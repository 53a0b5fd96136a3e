//! # Marketo Source
//!
//! A Rust-native Marketo extraction tap: it drives the bulk export API for
//! leads and activities, the REST API for campaigns, lists, programs, and
//! activity types, and emits schema, record, and state messages as JSON
//! lines on stdout.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use marketo_source::catalog::Catalog;
//! use marketo_source::client::HttpMarketoClient;
//! use marketo_source::config::Config;
//! use marketo_source::output::OutputChannel;
//! use marketo_source::state::State;
//! use marketo_source::sync::Syncer;
//!
//! #[tokio::main]
//! async fn main() -> marketo_source::Result<()> {
//!     let config = Config::from_file("config.json")?;
//!     let catalog = Catalog::from_file("catalog.json")?;
//!
//!     let client = Arc::new(HttpMarketoClient::new(config.clone())?);
//!     let mut syncer = Syncer::new(
//!         client,
//!         catalog,
//!         &config,
//!         State::new(),
//!         OutputChannel::stdout(),
//!     );
//!     syncer.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            Syncer                              │
//! │  walks the catalog, dispatches each stream to its strategy,    │
//! │  resumes from currently_syncing after a crash                  │
//! └────────────────────────────────────────────────────────────────┘
//!          │                     │                      │
//! ┌────────┴────────┐  ┌─────────┴──────────┐  ┌────────┴────────┐
//! │  Bulk exports   │  │   REST pagination  │  │     Output      │
//! ├─────────────────┤  ├────────────────────┤  ├─────────────────┤
//! │ create/enqueue  │  │ nextPageToken loop │  │ SCHEMA messages │
//! │ status polling  │  │ offset loop        │  │ RECORD messages │
//! │ ranged download │  │ single fetch       │  │ STATE durably   │
//! │ CSV row stream  │  │                    │  │ written through │
//! └─────────────────┘  └────────────────────┘  └─────────────────┘
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration loaded from JSON
pub mod config;

/// Catalog parsing and stream selection
pub mod catalog;

/// Authenticated Marketo API client with retry and rate limiting
pub mod client;

/// Incremental UTF-8 and CSV decoding for chunked downloads
pub mod decode;

/// Bulk export jobs and the row stream over their files
pub mod export;

/// Record formatting and activity flattening
pub mod record;

/// Bookmark state and the write-through store
pub mod state;

/// Message output channel
pub mod output;

/// Sync orchestration over the catalog's streams
pub mod sync;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
