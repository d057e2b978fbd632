//! Run orchestration
//!
//! Sequences the refresh: filestore copy and database overwrite run side
//! by side, then sanitize, addon upgrades, and the Shopify re-point, with
//! commit-or-drop discipline around the two guarded phases. Module
//! upgrades are not transactional, so there is no fine-grained undo: a
//! guarded failure after the database exists drops the whole database
//! before the error is re-raised, guaranteeing no half-sanitized
//! environment stays reachable.

use crate::addons::AddonUpdater;
use crate::command;
use crate::db::{ConnectionManager, SqlRunner};
use crate::error::{DatabaseUpdateError, RestoreResult, RestorerError};
use crate::sanitize::Sanitizer;
use crate::settings::{LocalSettings, ShopifySettings, UpstreamSettings};
use crate::shopify::ConfigUpdater;
use crate::sync::RemoteSync;
use std::sync::Arc;
use tokio::process::Child;

pub struct UpstreamRestorer {
    local: Arc<LocalSettings>,
    shopify: ShopifySettings,
    conn: ConnectionManager,
    sync: RemoteSync,
}

impl UpstreamRestorer {
    pub fn new(
        local: LocalSettings,
        upstream: UpstreamSettings,
        shopify: ShopifySettings,
    ) -> Self {
        let local = Arc::new(local);
        Self {
            conn: ConnectionManager::new(Arc::clone(&local)),
            sync: RemoteSync::new(Arc::clone(&local), upstream),
            local,
            shopify,
        }
    }

    /// Execute the full pipeline. With `do_sanitize` the sanitize and
    /// Shopify phases run under commit-or-drop; without it the clone is
    /// left exactly as restored.
    pub async fn run(&mut self, do_sanitize: bool) -> RestoreResult<()> {
        let filestore = self.sync.copy_filestore()?;
        self.sync.overwrite_database(&self.conn).await?;
        // A filestore failure leaves the database restored; only
        // guarded-phase failures trigger the drop.
        await_filestore(filestore).await?;

        if do_sanitize {
            if let Err(err) = self.sanitize_phase().await {
                return self.handle_guarded_failure(err).await;
            }
        }

        AddonUpdater::new(&self.local).update_addons().await?;

        if do_sanitize {
            if let Err(err) = self.shopify_phase().await {
                return self.handle_guarded_failure(err).await;
            }
        }

        tracing::info!("Upstream overwrite completed successfully");
        Ok(())
    }

    async fn sanitize_phase(&mut self) -> Result<(), DatabaseUpdateError> {
        let runner = self.conn.connect().await?;
        Sanitizer::new(&self.local).sanitize(runner).await?;
        runner.commit().await?;
        Ok(())
    }

    async fn shopify_phase(&mut self) -> Result<(), DatabaseUpdateError> {
        let runner = self.conn.connect().await?;
        let updater = ConfigUpdater::new(&self.shopify);
        updater.update_shopify_config(runner).await?;
        updater.clear_shopify_ids(runner).await?;
        runner.commit().await?;
        Ok(())
    }

    /// Commit-or-drop: failures in [`should_drop`]'s trigger set drop the
    /// local database before re-raising. A raw driver error aborts without
    /// the drop - its uncommitted transaction dies with the connection,
    /// leaving the database restored-but-unsanitized.
    async fn handle_guarded_failure(&mut self, err: DatabaseUpdateError) -> RestoreResult<()> {
        if should_drop(&err) {
            tracing::error!(error = %err, "guarded phase failed; rolling back");
            self.drop_database().await?;
        }
        Err(err.into())
    }

    /// Destructive rollback: terminate sessions and drop the local
    /// database entirely.
    async fn drop_database(&mut self) -> RestoreResult<()> {
        tracing::warn!("Rolling back database update: dropping database");
        self.conn.reset();
        self.conn.terminate_other_sessions().await?;
        let cmd = format!(
            "dropdb --if-exists -h {host} -U {user} {db}",
            host = self.local.host,
            user = self.local.db_user,
            db = self.local.db_name,
        );
        command::run_shell(&cmd, &self.local.pg_env()).await
    }
}

/// Whether a guarded-phase failure triggers the destructive rollback.
/// Safety, postcondition, and Shopify-write failures do; a raw driver
/// error does not, so the restored-but-unsanitized database stays up for
/// inspection instead of destroying evidence of an infrastructure problem.
fn should_drop(err: &DatabaseUpdateError) -> bool {
    !matches!(err, DatabaseUpdateError::Sql(_))
}

/// Await the detached filestore rsync. A non-zero exit aborts the run
/// but never drops the database; only the filestore is suspect.
async fn await_filestore(mut child: Child) -> RestoreResult<()> {
    let status = child
        .wait()
        .await
        .map_err(|source| RestorerError::CommandSpawn {
            command: "rsync filestore copy".to_string(),
            source,
        })?;
    if !status.success() {
        return Err(RestorerError::FilestoreSync {
            status: status.code().unwrap_or(-1),
        });
    }
    tracing::info!("Filestore overwrite completed");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
