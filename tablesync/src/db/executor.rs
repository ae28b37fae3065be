//! SQL executor
//!
//! This module provides the statement-execution seam every component talks
//! to, and its MySQL implementation over [`DatabaseConnection`].

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, Row as _, TypeInfo, ValueRef};

use crate::db::connection::DatabaseConnection;
use crate::error::Result;
use crate::query::value::SqlValue;

/// A fetched row, columns in select-list order
pub type Row = IndexMap<String, SqlValue>;

/// Runs statements against a live database
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement without parameters, returning affected rows
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute a statement with positional `?` parameters
    async fn execute_with(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a query with positional `?` parameters and return every row
    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;
}

#[async_trait]
impl SqlExecutor for DatabaseConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!(sql, "Executing statement");
        // A bare &str runs over the text protocol, which accepts every DDL form
        let result = self.pool().execute(sql).await?;
        Ok(result.rows_affected())
    }

    async fn execute_with(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        tracing::debug!(sql, params = params.len(), "Executing statement");
        let query = bind_all(sqlx::query(sql), params);
        let result = query.execute(self.pool()).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        tracing::debug!(sql, params = params.len(), "Running query");
        let query = bind_all(sqlx::query(sql), params);
        let rows = query.fetch_all(self.pool()).await?;
        rows.iter().map(decode_row).collect()
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(n) => query.bind(*n),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut decoded = IndexMap::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info().name())?;
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

/// Decode one column by its reported type name
fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match type_name {
        "BOOLEAN" => SqlValue::Bool(row.try_get_unchecked::<bool, _>(index)?),
        name if name.ends_with("UNSIGNED") => {
            let n = row.try_get_unchecked::<u64, _>(index)?;
            i64::try_from(n).map_or(SqlValue::Float(n as f64), SqlValue::Int)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?)
        }
        "FLOAT" => SqlValue::Float(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "DOUBLE" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "DECIMAL" => {
            let text = row.try_get_unchecked::<String, _>(index)?;
            text.parse::<f64>().map_or(SqlValue::Text(text), SqlValue::Float)
        }
        "DATETIME" | "TIMESTAMP" => SqlValue::Text(
            row.try_get_unchecked::<NaiveDateTime, _>(index)?
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
        "DATE" => SqlValue::Text(row.try_get_unchecked::<NaiveDate, _>(index)?.to_string()),
        "TIME" => SqlValue::Text(row.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
        // information_schema reports some text columns with binary collation
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };

    Ok(value)
}
