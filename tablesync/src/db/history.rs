//! Migration history
//!
//! This module handles tracking of executed migration statements in a
//! history table.

use chrono::{DateTime, Utc};

use crate::db::executor::SqlExecutor;
use crate::error::Result;
use crate::query::value::SqlValue;
use crate::schema::generator::TABLE_OPTIONS;
use crate::utils::naming::quote_identifier;

/// A previously recorded statement
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub migration_id: String,
    pub table_name: String,
    pub statement_number: i64,
    pub statement: String,
    pub applied_at: String,
}

/// Records executed DDL, one row per statement
pub struct MigrationHistory<'a> {
    table_name: &'a str,
}

impl<'a> MigrationHistory<'a> {
    pub fn new(table_name: &'a str) -> Self {
        Self { table_name }
    }

    /// Ensure the migration history table exists
    pub async fn ensure_table(&self, executor: &dyn SqlExecutor) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n\
             \x20 `id` BIGINT NOT NULL AUTO_INCREMENT,\n\
             \x20 `migration_id` VARCHAR(96) NOT NULL,\n\
             \x20 `table_name` VARCHAR(64) NOT NULL,\n\
             \x20 `statement_number` INT NOT NULL,\n\
             \x20 `statement` TEXT NOT NULL,\n\
             \x20 `applied_at` DATETIME NOT NULL,\n\
             \x20 PRIMARY KEY (`id`)\n\
             ) {}",
            quote_identifier(self.table_name),
            TABLE_OPTIONS
        );
        executor.execute(&sql).await?;
        Ok(())
    }

    /// Record the statements of one migration run under a single id,
    /// numbered from 1, returning the id
    pub async fn record(
        &self,
        executor: &dyn SqlExecutor,
        migrated_table: &str,
        statements: &[String],
    ) -> Result<String> {
        let now = Utc::now();
        let migration_id = generate_migration_id(now, migrated_table);
        let applied_at = now.format("%Y-%m-%d %H:%M:%S").to_string();

        let sql = format!(
            "INSERT INTO {} (`migration_id`, `table_name`, `statement_number`, `statement`, `applied_at`) \
             VALUES (?, ?, ?, ?, ?)",
            quote_identifier(self.table_name)
        );

        for (i, statement) in statements.iter().enumerate() {
            let params = [
                SqlValue::from(migration_id.as_str()),
                SqlValue::from(migrated_table),
                SqlValue::Int(i as i64 + 1),
                SqlValue::from(statement.as_str()),
                SqlValue::from(applied_at.as_str()),
            ];
            executor.execute_with(&sql, &params).await?;
        }

        tracing::info!(
            migration_id = %migration_id,
            table = migrated_table,
            statements = statements.len(),
            "Recorded migration history"
        );

        Ok(migration_id)
    }

    /// Recorded statements for one table, oldest first
    pub async fn entries(
        &self,
        executor: &dyn SqlExecutor,
        migrated_table: &str,
    ) -> Result<Vec<HistoryEntry>> {
        let sql = format!(
            "SELECT `migration_id`, `table_name`, `statement_number`, `statement`, `applied_at` \
             FROM {} WHERE `table_name` = ? ORDER BY `id`",
            quote_identifier(self.table_name)
        );
        let rows = executor.fetch_all(&sql, &[SqlValue::from(migrated_table)]).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let text = |key: &str| row.get(key).map(ToString::to_string).unwrap_or_default();
                HistoryEntry {
                    migration_id: text("migration_id"),
                    table_name: text("table_name"),
                    statement_number: match row.get("statement_number") {
                        Some(SqlValue::Int(n)) => *n,
                        _ => 0,
                    },
                    statement: text("statement"),
                    applied_at: text("applied_at"),
                }
            })
            .collect())
    }
}

/// Generate a migration ID based on a millisecond timestamp
fn generate_migration_id(now: DateTime<Utc>, table_name: &str) -> String {
    format!("{}_{}", now.format("%Y%m%d%H%M%S%3f"), table_name)
}
