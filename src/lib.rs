//! Back up and restore Entra ID applications through Microsoft Graph
//!
//! The pipeline is split into small pieces that can be driven independently:
//!
//! - [`graph::pagination`] follows `@odata.nextLink` cursors to a complete listing
//! - [`resolver::DirectoryNameResolver`] turns ids into display names for reports
//! - [`backup::collector::EntityGraphCollector`] captures applications into bundles
//! - [`backup::store::BackupStore`] persists bundles as a JSON array
//! - [`restore::RestoreOrchestrator`] recreates bundles in a destination tenant
//!
//! All directory access goes through [`graph::directory::DirectoryApi`].

pub mod backup;
pub mod config;
pub mod error;
pub mod graph;
pub mod progress;
pub mod resolver;
pub mod restore;

pub use error::{AppVaultError, Result};
