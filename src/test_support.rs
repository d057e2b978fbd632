//! Scripted `SqlRunner` for unit tests.

use crate::db::{SqlRow, SqlRunner};
use crate::error::SqlError;
use crate::sql::Statement;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Records executed statements and replays canned query results in order.
#[derive(Default)]
pub(crate) struct MockRunner {
    pub executed: Vec<Statement>,
    pub queried: Vec<Statement>,
    pub query_results: VecDeque<Vec<SqlRow>>,
    pub schema_columns: Vec<String>,
    pub commits: usize,
    /// When set, `execute` fails for any statement whose built SQL
    /// contains this marker.
    pub fail_execute_containing: Option<String>,
}

impl MockRunner {
    pub fn with_query_results(results: Vec<Vec<SqlRow>>) -> Self {
        Self {
            query_results: results.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SqlRunner for MockRunner {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SqlError> {
        if let Some(marker) = &self.fail_execute_containing {
            if statement.build().sql.contains(marker.as_str()) {
                return Err(SqlError::Statement {
                    reason: format!("injected failure for '{marker}'"),
                });
            }
        }
        self.executed.push(statement.clone());
        Ok(1)
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<SqlRow>, SqlError> {
        self.queried.push(statement.clone());
        Ok(self.query_results.pop_front().unwrap_or_default())
    }

    async fn existing_columns(
        &mut self,
        _table: &str,
        prefix: &str,
    ) -> Result<Vec<String>, SqlError> {
        Ok(self
            .schema_columns
            .iter()
            .filter(|col| col.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn commit(&mut self) -> Result<(), SqlError> {
        self.commits += 1;
        Ok(())
    }
}
