//! State management module
//!
//! Handles bookmark tracking, export resumability, and crash recovery.
//! State is emitted downstream after every mutation so an interrupted sync
//! can pick up from the last acknowledged snapshot.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Bookmark layout with per-stream export and pagination markers
//! - `StateStore` - Write-through handle that persists on every mutation

mod store;
mod types;

pub use store::StateStore;
pub use types::{State, StreamBookmarks};

#[cfg(test)]
mod store_tests;
