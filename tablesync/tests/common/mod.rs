//! Scripted executor shared by the integration tests
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use tablesync::error::{Error, Result};
use tablesync::{Row, SqlExecutor, SqlValue};

/// Answers queries from canned rows and records every statement.
///
/// A query gets the rows of the first response whose needle occurs in its
/// SQL, or no rows at all. A statement containing a failure needle fails
/// with that message and is not recorded as executed.
#[derive(Default)]
pub struct MockExecutor {
    responses: Vec<(String, Vec<Row>)>,
    failures: Vec<(String, String)>,
    executed: Mutex<Vec<String>>,
    bound: Mutex<Vec<(String, Vec<SqlValue>)>>,
    queries: Mutex<Vec<(String, Vec<SqlValue>)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, rows: Vec<Row>) -> Self {
        self.responses.push((needle.to_string(), rows));
        self
    }

    pub fn fail_on(mut self, needle: &str, message: &str) -> Self {
        self.failures.push((needle.to_string(), message.to_string()));
        self
    }

    /// A live table with the given column, index and foreign key rows
    pub fn with_table(self, columns: Vec<Row>, indexes: Vec<Row>, foreign_keys: Vec<Row>) -> Self {
        self.respond(
            "information_schema.tables",
            vec![row(&[("table_count", SqlValue::Int(1))])],
        )
        .respond("information_schema.columns", columns)
        .respond("information_schema.statistics", indexes)
        .respond("information_schema.key_column_usage", foreign_keys)
    }

    /// Statements run through `execute`, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Statements run through `execute_with`, with their parameters
    pub fn bound(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.bound.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.queries.lock().unwrap().clone()
    }

    fn failure(&self, sql: &str) -> Option<Error> {
        self.failures
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, message)| Error::DatabaseError(message.clone()))
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> Result<u64> {
        if let Some(error) = self.failure(sql) {
            return Err(error);
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(0)
    }

    async fn execute_with(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        if let Some(error) = self.failure(sql) {
            return Err(error);
        }
        self.bound
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(1)
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.queries
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

pub fn row(values: &[(&str, SqlValue)]) -> Row {
    values
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn text_or_null(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::from)
}

/// An information_schema.columns row
pub fn column_row(
    name: &str,
    column_type: &str,
    nullable: bool,
    key: &str,
    default: Option<&str>,
    extra: &str,
) -> Row {
    row(&[
        ("column_name", SqlValue::from(name)),
        ("column_type", SqlValue::from(column_type)),
        ("is_nullable", SqlValue::from(if nullable { "YES" } else { "NO" })),
        ("column_default", text_or_null(default)),
        ("column_key", SqlValue::from(key)),
        ("extra", SqlValue::from(extra)),
    ])
}

/// An information_schema.statistics row
pub fn index_row(index: &str, column: &str, unique: bool) -> Row {
    row(&[
        ("index_name", SqlValue::from(index)),
        ("column_name", SqlValue::from(column)),
        ("non_unique", SqlValue::Int(if unique { 0 } else { 1 })),
    ])
}

/// A key_column_usage row joined with its referential constraint
pub fn foreign_key_row(name: &str, column: &str, ref_table: &str, ref_column: &str) -> Row {
    row(&[
        ("constraint_name", SqlValue::from(name)),
        ("column_name", SqlValue::from(column)),
        ("referenced_table_name", SqlValue::from(ref_table)),
        ("referenced_column_name", SqlValue::from(ref_column)),
        ("delete_rule", SqlValue::from("RESTRICT")),
        ("update_rule", SqlValue::from("RESTRICT")),
    ])
}

/// The `users` table as MySQL reports it for the basic model
pub fn live_users_columns() -> Vec<Row> {
    vec![
        column_row("id", "bigint", false, "PRI", None, "auto_increment"),
        column_row("email", "varchar(255)", false, "UNI", None, ""),
    ]
}
