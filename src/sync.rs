//! Filestore and database transfer from upstream
//!
//! The filestore mirrors over rsync as a detached child process; the
//! database travels as a compressed `pg_dump` archive fetched over SSH and
//! restored into a freshly recreated local database. The two run side by
//! side: the orchestrator spawns the rsync, drives the database pipeline to
//! completion, then awaits the rsync's exit status.

use crate::command;
use crate::db::ConnectionManager;
use crate::error::RestoreResult;
use crate::settings::{LocalSettings, UpstreamSettings};
use std::sync::Arc;
use tokio::process::Child;

const BACKUP_PATH: &str = "/tmp/upstream_db_backup.sql.gz";

pub struct RemoteSync {
    local: Arc<LocalSettings>,
    upstream: UpstreamSettings,
}

impl RemoteSync {
    pub fn new(local: Arc<LocalSettings>, upstream: UpstreamSettings) -> Self {
        Self { local, upstream }
    }

    /// Start mirroring the upstream filestore into the local path,
    /// deleting local entries absent upstream. Non-blocking; the caller
    /// awaits the returned child.
    pub fn copy_filestore(&self) -> RestoreResult<Child> {
        tracing::info!("Overwriting filestore");
        command::spawn_shell(&self.rsync_command(), &[])
    }

    /// Dump the upstream database, then drop, recreate and restore the
    /// local one. Synchronous; any stage failure aborts the pipeline.
    pub async fn overwrite_database(&self, conn: &ConnectionManager) -> RestoreResult<()> {
        let env = self.local.pg_env();
        command::run_shell(&self.dump_command(), &env).await?;
        conn.terminate_other_sessions().await?;
        command::run_shell(&self.dropdb_command(), &env).await?;
        command::run_shell(&self.createdb_command(), &env).await?;
        command::run_shell(&self.restore_command(), &env).await?;
        command::run_shell(&format!("rm {BACKUP_PATH}"), &[]).await?;
        Ok(())
    }

    fn rsync_command(&self) -> String {
        format!(
            "rsync -az --delete {user}@{host}:{src} {dest}",
            user = self.upstream.user,
            host = self.upstream.host,
            src = self.upstream.filestore_path.display(),
            dest = self.local.filestore_path.display(),
        )
    }

    fn dump_command(&self) -> String {
        format!(
            "ssh {user}@{host} \"cd /tmp && sudo -u '{db_user}' pg_dump -Fc '{db}'\" \
             | gzip > {BACKUP_PATH}",
            user = self.upstream.user,
            host = self.upstream.host,
            db_user = self.upstream.db_user,
            db = self.upstream.db_name,
        )
    }

    fn dropdb_command(&self) -> String {
        format!(
            "dropdb --if-exists -h {host} -U {user} {db}",
            host = self.local.host,
            user = self.local.db_user,
            db = self.local.db_name,
        )
    }

    fn createdb_command(&self) -> String {
        format!(
            "createdb -h {host} -U {user} {db}",
            host = self.local.host,
            user = self.local.db_user,
            db = self.local.db_name,
        )
    }

    fn restore_command(&self) -> String {
        format!(
            "gunzip < {BACKUP_PATH} | pg_restore -d {db} -h {host} -U {user} \
             --no-owner --role={user}",
            db = self.local.db_name,
            host = self.local.host,
            user = self.local.db_user,
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
