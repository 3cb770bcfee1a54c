//! Mirrors tax nexus and catalog items, with their classifications, from a
//! source catalog environment into a target one.

pub mod catalog;
pub mod config;
pub mod error;
pub mod sync;

pub use config::SyncConfig;
pub use error::{CatalogError, SyncError, SyncResult};
