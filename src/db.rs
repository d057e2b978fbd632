//! Database connection management and the statement-runner seam
//!
//! One `tokio-postgres` client is created lazily and reused for every
//! statement of the run. The live runner opens an explicit transaction on
//! the first statement and holds it until `commit`, reproducing the coarse
//! commit boundaries the pipeline depends on: everything between two
//! commits either lands together or dies with the connection.
//!
//! Mutating components execute through the [`SqlRunner`] trait so tests can
//! substitute a scripted implementation.

use crate::error::SqlError;
use crate::settings::LocalSettings;
use crate::sql::{SqlValue, Statement};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls};

const ADMIN_DB: &str = "postgres";

/// A result row addressed by column name.
///
/// Positional indexing is deliberately not offered; workflows project the
/// columns they need by name.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new<C: Into<String>>(cells: impl IntoIterator<Item = (C, SqlValue)>) -> Self {
        let (columns, values) = cells
            .into_iter()
            .map(|(col, val)| (col.into(), val))
            .unzip();
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|idx| &self.values[idx])
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(SqlValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(SqlValue::Int(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Executes built statements against the refreshed database.
#[async_trait]
pub trait SqlRunner: Send {
    /// Execute a mutation, returning the number of affected rows.
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SqlError>;

    /// Execute a query, returning named-column rows.
    async fn query(&mut self, statement: &Statement) -> Result<Vec<SqlRow>, SqlError>;

    /// Column names of `table` starting with `prefix`, per the live schema.
    async fn existing_columns(
        &mut self,
        table: &str,
        prefix: &str,
    ) -> Result<Vec<String>, SqlError>;

    /// Commit everything executed since the last commit.
    async fn commit(&mut self) -> Result<(), SqlError>;
}

/// Live runner over a single `tokio-postgres` client.
pub struct PgRunner {
    client: Client,
    in_transaction: bool,
}

impl PgRunner {
    fn new(client: Client) -> Self {
        Self {
            client,
            in_transaction: false,
        }
    }

    async fn begin_if_needed(&mut self) -> Result<(), SqlError> {
        if !self.in_transaction {
            self.client
                .batch_execute("BEGIN")
                .await
                .map_err(statement_error)?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

#[async_trait]
impl SqlRunner for PgRunner {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SqlError> {
        self.begin_if_needed().await?;
        let built = statement.build();
        tracing::debug!(sql = %built.sql, "executing statement");
        self.client
            .execute(&built.sql, &built.param_refs())
            .await
            .map_err(statement_error)
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<SqlRow>, SqlError> {
        self.begin_if_needed().await?;
        let built = statement.build();
        tracing::debug!(sql = %built.sql, "running query");
        let rows = self
            .client
            .query(&built.sql, &built.param_refs())
            .await
            .map_err(statement_error)?;
        rows.iter().map(convert_row).collect()
    }

    async fn existing_columns(
        &mut self,
        table: &str,
        prefix: &str,
    ) -> Result<Vec<String>, SqlError> {
        self.begin_if_needed().await?;
        let pattern = format!("{prefix}%");
        let rows = self
            .client
            .query(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_name = $1 AND column_name LIKE $2",
                &[&table, &pattern],
            )
            .await
            .map_err(statement_error)?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(statement_error))
            .collect()
    }

    async fn commit(&mut self) -> Result<(), SqlError> {
        if self.in_transaction {
            self.client
                .batch_execute("COMMIT")
                .await
                .map_err(statement_error)?;
            self.in_transaction = false;
            tracing::debug!("committed");
        }
        Ok(())
    }
}

/// Lazily creates and reuses the one connection to the local target.
pub struct ConnectionManager {
    local: Arc<LocalSettings>,
    runner: Option<PgRunner>,
}

impl ConnectionManager {
    pub fn new(local: Arc<LocalSettings>) -> Self {
        Self {
            local,
            runner: None,
        }
    }

    /// Idempotent: returns the existing runner, opening a connection on
    /// first use.
    pub async fn connect(&mut self) -> Result<&mut PgRunner, SqlError> {
        if self.runner.is_none() {
            let client = open_client(&self.local, &self.local.db_name).await?;
            tracing::info!(db = %self.local.db_name, "connected to local database");
            self.runner = Some(PgRunner::new(client));
        }
        // Populated just above; the invariant is local to this function.
        Ok(self
            .runner
            .as_mut()
            .expect("runner initialized by connect"))
    }

    /// Discard the cached connection. Required after the target database is
    /// dropped; the next `connect` dials fresh.
    pub fn reset(&mut self) {
        self.runner = None;
    }

    /// Terminate every backend session against the target database except
    /// our own administrative one. Must run immediately before any
    /// drop/recreate of the target, or those commands fail with
    /// "database is in use".
    pub async fn terminate_other_sessions(&self) -> Result<(), SqlError> {
        let client = open_client(&self.local, ADMIN_DB).await?;
        client
            .execute(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                 WHERE datname = $1 AND pid <> pg_backend_pid()",
                &[&self.local.db_name],
            )
            .await
            .map_err(statement_error)?;
        tracing::info!(db = %self.local.db_name, "terminated all other database sessions");
        Ok(())
    }
}

async fn open_client(local: &LocalSettings, dbname: &str) -> Result<Client, SqlError> {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&local.host)
        .port(local.port)
        .user(&local.db_user)
        .password(local.db_password.expose_secret())
        .dbname(dbname);

    let (client, connection) = config.connect(NoTls).await.map_err(|e| SqlError::Connect {
        dbname: dbname.to_string(),
        reason: e.to_string(),
    })?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "database connection task failed");
        }
    });

    Ok(client)
}

fn statement_error(source: tokio_postgres::Error) -> SqlError {
    SqlError::Statement {
        reason: source.to_string(),
    }
}

/// Decode a driver row into the typed named-column representation.
fn convert_row(row: &tokio_postgres::Row) -> Result<SqlRow, SqlError> {
    let mut cells = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx)
                .map_err(statement_error)?
                .map(SqlValue::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)
                .map_err(statement_error)?
                .map(|v| SqlValue::Int(i64::from(v)))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)
                .map_err(statement_error)?
                .map(|v| SqlValue::Int(i64::from(v)))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)
                .map_err(statement_error)?
                .map(SqlValue::Int)
        } else {
            row.try_get::<_, Option<String>>(idx)
                .map_err(statement_error)?
                .map(SqlValue::Text)
        };
        cells.push((
            column.name().to_string(),
            value.unwrap_or(SqlValue::Null),
        ));
    }
    Ok(SqlRow::new(cells))
}

// =============================================================================
// TESTS
// =============================================================================
