//! Migration execution
//!
//! Turns a [`SchemaDiff`] into ordered DDL and runs it statement by
//! statement. MySQL DDL commits implicitly, so nothing is rolled back on
//! failure: execution stops at the first failing statement and the result
//! records what already ran.

use serde::Serialize;

use crate::db::executor::SqlExecutor;
use crate::error::{Error, Result};
use crate::schema::diff::SchemaDiff;
use crate::schema::generator::{
    add_column_sql, create_table_sql, drop_column_sql, modify_column_sql, ColumnPosition,
};

/// The statement that stopped a migration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedStatement {
    pub statement: String,
    pub message: String,
}

/// Outcome of running a diff against one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationResult {
    pub table: String,
    /// Statements that completed, in execution order
    pub executed: Vec<String>,
    pub failed: Option<FailedStatement>,
}

impl MigrationResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Executed statements, or `DdlExecutionError` for the failing one
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.failed {
            None => Ok(self.executed),
            Some(failed) => Err(Error::DdlExecutionError {
                statement: failed.statement,
                message: failed.message,
            }),
        }
    }
}

/// Plans and runs column DDL
pub struct MigrationExecutor;

impl MigrationExecutor {
    /// Ordered statements for a diff: a single CREATE TABLE for a missing
    /// table, otherwise ADD COLUMN, then MODIFY COLUMN, then DROP COLUMN
    pub fn plan(diff: &SchemaDiff, table_name: &str) -> Vec<String> {
        if let Some(table) = &diff.create_table {
            return vec![create_table_sql(table)];
        }

        let mut statements = Vec::new();

        for column in &diff.columns_to_add {
            let position = diff
                .column_predecessors
                .get(&column.name.to_lowercase())
                .map(|previous| match previous {
                    Some(previous) => ColumnPosition::After(previous),
                    None => ColumnPosition::First,
                });
            statements.push(add_column_sql(table_name, column, position));
        }

        for change in &diff.columns_to_modify {
            statements.push(modify_column_sql(table_name, &change.to));
        }

        for column in &diff.columns_to_remove {
            statements.push(drop_column_sql(table_name, &column.name));
        }

        statements
    }

    /// Execute the planned statements in order, stopping at the first failure
    pub async fn execute(
        executor: &dyn SqlExecutor,
        diff: &SchemaDiff,
        table_name: &str,
    ) -> MigrationResult {
        let statements = Self::plan(diff, table_name);
        let mut executed = Vec::with_capacity(statements.len());

        for (i, statement) in statements.into_iter().enumerate() {
            tracing::info!(
                table = table_name,
                statement_number = i + 1,
                sql = %statement,
                "Executing migration statement"
            );

            if let Err(e) = executor.execute(&statement).await {
                tracing::error!(
                    table = table_name,
                    sql = %statement,
                    error = %e,
                    executed = executed.len(),
                    "Migration statement failed; earlier statements stay applied"
                );
                return MigrationResult {
                    table: table_name.to_string(),
                    executed,
                    failed: Some(FailedStatement {
                        statement,
                        message: e.to_string(),
                    }),
                };
            }

            executed.push(statement);
        }

        MigrationResult {
            table: table_name.to_string(),
            executed,
            failed: None,
        }
    }
}
