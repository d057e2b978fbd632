//! upstream-restore
//!
//! Refreshes a local Odoo deployment from an upstream (production-like)
//! one: clones the upstream database and filestore, sanitizes the copy so
//! it cannot send real mail, run real cron jobs, or talk to the live
//! Shopify store, then re-points the Shopify configuration at a safe,
//! non-production store.
//!
//! The pipeline is deliberately destructive and guarded: candidate
//! configuration values are checked against production indicators before
//! they are written, and any safety or postcondition failure after the
//! local database exists drops that database rather than leave a
//! half-sanitized clone reachable.

pub mod addons;
mod command;
pub mod db;
pub mod error;
pub mod restorer;
pub mod safety;
pub mod sanitize;
pub mod settings;
pub mod shopify;
pub mod sql;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use addons::AddonUpdater;
pub use db::{ConnectionManager, PgRunner, SqlRow, SqlRunner};
pub use error::{
    DatabaseUpdateError, RestoreResult, RestorerError, SettingsError, SqlError,
};
pub use restorer::UpstreamRestorer;
pub use sanitize::{ActiveCron, Sanitizer};
pub use settings::{LocalSettings, ShopifySettings, UpstreamSettings};
pub use shopify::ConfigUpdater;
pub use sql::{BuiltStatement, SqlValue, Statement};
pub use sync::RemoteSync;
