//! Error types for the upstream restore pipeline

use crate::sanitize::ActiveCron;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Missing required environment key: {key}")]
    MissingKey { key: &'static str },

    #[error("Invalid value for {key}: {value} - {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Database driver errors.
///
/// The driver's own error type is flattened into a reason string so that
/// these values stay cloneable and comparable, and so that tests can
/// fabricate them without a live connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SqlError {
    #[error("Failed to connect to database '{dbname}': {reason}")]
    Connect { dbname: String, reason: String },

    #[error("Statement execution failed: {reason}")]
    Statement { reason: String },
}

/// Failures of the sanitize / Shopify-update phases.
///
/// With the exception of the transparent `Sql` variant, any of these caught
/// at a commit boundary triggers the destructive rollback: the local
/// database is dropped before the error is re-raised. A raw driver error
/// aborts the run without the drop; its uncommitted writes die with the
/// connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseUpdateError {
    #[error(
        "SAFETY CHECK FAILED: '{value}' appears to be production \
         (found indicator '{indicator}'); refusing to continue"
    )]
    SafetyViolation {
        value: String,
        indicator: &'static str,
    },

    #[error("The following cron jobs are still active:\n{}", format_active_crons(.jobs))]
    PostconditionViolation { jobs: Vec<ActiveCron> },

    #[error("Failed to update Shopify setting '{key}': {source}")]
    ShopifyUpdate { key: String, source: SqlError },

    #[error(transparent)]
    Sql(#[from] SqlError),
}

/// Master error type for the restore pipeline.
#[derive(Debug, Error)]
pub enum RestorerError {
    #[error("Command failed: {command} (exit status {status})")]
    CommandFailed { command: String, status: i32 },

    #[error("Failed to spawn command: {command}: {source}")]
    CommandSpawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Filestore rsync failed with exit status {status}")]
    FilestoreSync { status: i32 },

    #[error("Addon upgrade failed with exit status {status}")]
    AddonUpdate { status: i32 },

    #[error("Failed to read addons directory {path}: {source}")]
    AddonScan {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Database update error: {0}")]
    DatabaseUpdate(#[from] DatabaseUpdateError),

    #[error("Database error: {0}")]
    Sql(#[from] SqlError),
}

/// Result type alias for restore operations.
pub type RestoreResult<T> = Result<T, RestorerError>;

fn format_active_crons(jobs: &[ActiveCron]) -> String {
    jobs.iter()
        .map(|job| format!("- {} (id: {})", job.name, job.id))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// TESTS
// =============================================================================
