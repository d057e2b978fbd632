//! Database sanitization
//!
//! Disables everything that could make a freshly cloned database reach the
//! outside world: the outbound mail transport, catchall/bounce mail
//! routing, and every scheduled cron job. If a public base URL is
//! configured for the local instance it is written here as well.
//!
//! Sanitization ends with a hard verification gate: a query for cron jobs
//! still marked active. Any survivors fail the run; the caller must commit
//! only after the gate passes.

use crate::db::SqlRunner;
use crate::error::DatabaseUpdateError;
use crate::settings::LocalSettings;
use crate::sql::Statement;

/// A cron job that survived sanitization, as reported by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCron {
    pub id: i64,
    pub name: String,
}

pub struct Sanitizer<'a> {
    local: &'a LocalSettings,
}

impl<'a> Sanitizer<'a> {
    pub fn new(local: &'a LocalSettings) -> Self {
        Self { local }
    }

    /// The fixed mutation batch, in execution order.
    fn statements(&self) -> Vec<Statement> {
        let mut statements = vec![
            Statement::update_all("ir.mail_server", "active", false),
            Statement::upsert(
                "ir.config_parameter",
                "key",
                "mail.catchall.domain",
                "value",
                "False",
            ),
            Statement::upsert(
                "ir.config_parameter",
                "key",
                "mail.catchall.alias",
                "value",
                "False",
            ),
            Statement::upsert(
                "ir.config_parameter",
                "key",
                "mail.bounce.alias",
                "value",
                "False",
            ),
            Statement::update_all("ir.cron", "active", false),
        ];
        if let Some(base_url) = &self.local.base_url {
            statements.push(Statement::upsert(
                "ir.config_parameter",
                "key",
                "web.base.url",
                "value",
                base_url.as_str(),
            ));
        }
        statements
    }

    /// Run the batch, then verify no cron job is left active.
    pub async fn sanitize<R: SqlRunner>(&self, db: &mut R) -> Result<(), DatabaseUpdateError> {
        tracing::info!("Sanitizing database");
        for statement in self.statements() {
            tracing::debug!(?statement, "executing sanitize statement");
            db.execute(&statement).await?;
        }

        let gate = Statement::select("ir.cron", ["id", "cron_name"], Some(("active", true)));
        let survivors = db.query(&gate).await?;
        if !survivors.is_empty() {
            let jobs = survivors
                .iter()
                .map(|row| ActiveCron {
                    id: row.int("id").unwrap_or(0),
                    name: row.text("cron_name").unwrap_or("<unnamed>").to_string(),
                })
                .collect();
            return Err(DatabaseUpdateError::PostconditionViolation { jobs });
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
