//! CLI module
//!
//! Command-line interface for the tap.
//!
//! # Commands
//!
//! - `check` - Verify the configured credentials against the identity service
//! - `sync` - Extract every selected stream in the catalog

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
