//! Live schema reader
//!
//! Reads the current definition of one table from MySQL's information_schema
//! views. Every query binds the table name and scopes to `DATABASE()`.

use indexmap::IndexMap;

use crate::db::executor::{Row, SqlExecutor};
use crate::error::{Error, Result};
use crate::query::value::{DefaultValue, SqlValue};
use crate::schema::types::{ColumnSpec, ForeignKeySpec, IndexSpec, ReferentialAction, TableSchema};

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) AS table_count \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_name = ?";

const COLUMNS_SQL: &str = "SELECT column_name AS column_name, column_type AS column_type, \
     is_nullable AS is_nullable, column_default AS column_default, \
     column_key AS column_key, extra AS extra \
     FROM information_schema.columns \
     WHERE table_schema = DATABASE() AND table_name = ? \
     ORDER BY ordinal_position";

const INDEXES_SQL: &str = "SELECT index_name AS index_name, column_name AS column_name, \
     non_unique AS non_unique \
     FROM information_schema.statistics \
     WHERE table_schema = DATABASE() AND table_name = ? AND index_name <> 'PRIMARY' \
     ORDER BY index_name, seq_in_index";

const FOREIGN_KEYS_SQL: &str = "SELECT k.constraint_name AS constraint_name, \
     k.column_name AS column_name, \
     k.referenced_table_name AS referenced_table_name, \
     k.referenced_column_name AS referenced_column_name, \
     r.delete_rule AS delete_rule, r.update_rule AS update_rule \
     FROM information_schema.key_column_usage k \
     JOIN information_schema.referential_constraints r \
       ON r.constraint_schema = k.constraint_schema \
      AND r.constraint_name = k.constraint_name \
      AND r.table_name = k.table_name \
     WHERE k.table_schema = DATABASE() AND k.table_name = ? \
       AND k.referenced_table_name IS NOT NULL \
     ORDER BY k.constraint_name, k.ordinal_position";

/// Reads live table definitions
pub struct LiveSchemaReader;

impl LiveSchemaReader {
    /// Read a table's columns, indexes and foreign keys, or `None` when the
    /// table does not exist.
    ///
    /// Never retries; a transport failure surfaces as `ConnectionError`.
    pub async fn read(executor: &dyn SqlExecutor, table_name: &str) -> Result<Option<TableSchema>> {
        if !Self::table_exists(executor, table_name).await? {
            tracing::debug!(table = table_name, "Table does not exist");
            return Ok(None);
        }

        let columns = Self::read_columns(executor, table_name).await?;
        let indexes = Self::read_indexes(executor, table_name).await?;
        let foreign_keys = Self::read_foreign_keys(executor, table_name).await?;

        tracing::debug!(
            table = table_name,
            columns = columns.len(),
            indexes = indexes.len(),
            foreign_keys = foreign_keys.len(),
            "Read live schema"
        );

        // Live state is taken as reported, not validated against target invariants
        Ok(Some(TableSchema {
            table_name: table_name.to_string(),
            columns,
            indexes,
            foreign_keys,
        }))
    }

    pub async fn table_exists(executor: &dyn SqlExecutor, table_name: &str) -> Result<bool> {
        let rows = executor
            .fetch_all(TABLE_EXISTS_SQL, &[SqlValue::from(table_name)])
            .await?;
        let count = rows
            .first()
            .map(|row| integer(row, "table_count"))
            .transpose()?
            .unwrap_or(0);
        Ok(count > 0)
    }

    pub async fn read_columns(executor: &dyn SqlExecutor, table_name: &str) -> Result<Vec<ColumnSpec>> {
        let rows = executor
            .fetch_all(COLUMNS_SQL, &[SqlValue::from(table_name)])
            .await?;
        rows.iter().map(column_from_row).collect()
    }

    /// Secondary indexes grouped by name, columns in index order.
    /// The primary key is excluded.
    pub async fn read_indexes(executor: &dyn SqlExecutor, table_name: &str) -> Result<Vec<IndexSpec>> {
        let rows = executor
            .fetch_all(INDEXES_SQL, &[SqlValue::from(table_name)])
            .await?;

        let mut indexes: IndexMap<String, IndexSpec> = IndexMap::new();
        for row in &rows {
            let name = required_text(row, "index_name")?;
            let column = required_text(row, "column_name")?;
            let unique = integer(row, "non_unique")? == 0;

            indexes
                .entry(name.clone())
                .or_insert_with(|| IndexSpec {
                    name,
                    columns: Vec::new(),
                    unique,
                })
                .columns
                .push(column);
        }

        Ok(indexes.into_values().collect())
    }

    pub async fn read_foreign_keys(
        executor: &dyn SqlExecutor,
        table_name: &str,
    ) -> Result<Vec<ForeignKeySpec>> {
        let rows = executor
            .fetch_all(FOREIGN_KEYS_SQL, &[SqlValue::from(table_name)])
            .await?;

        let mut foreign_keys: IndexMap<String, ForeignKeySpec> = IndexMap::new();
        for row in &rows {
            let name = required_text(row, "constraint_name")?;
            if foreign_keys.contains_key(&name) {
                tracing::warn!(
                    table = table_name,
                    constraint = %name,
                    "Multi-column foreign key; only the first column is tracked"
                );
                continue;
            }

            let fk = ForeignKeySpec {
                name: name.clone(),
                column: required_text(row, "column_name")?,
                ref_table: required_text(row, "referenced_table_name")?,
                ref_column: required_text(row, "referenced_column_name")?,
                on_delete: action(row, "delete_rule")?,
                on_update: action(row, "update_rule")?,
            };
            foreign_keys.insert(name, fk);
        }

        Ok(foreign_keys.into_values().collect())
    }
}

fn column_from_row(row: &Row) -> Result<ColumnSpec> {
    let extra = text(row, "extra").unwrap_or_default();
    let default_value = text(row, "column_default")
        .map(|raw| DefaultValue::from_live(&raw, &extra))
        .filter(|default| *default != DefaultValue::Literal(SqlValue::Null));

    Ok(ColumnSpec {
        name: required_text(row, "column_name")?,
        sql_type: required_text(row, "column_type")?,
        nullable: required_text(row, "is_nullable")?.eq_ignore_ascii_case("YES"),
        default_value,
        is_primary_key: text(row, "column_key").is_some_and(|key| key.eq_ignore_ascii_case("PRI")),
        is_auto_increment: extra.to_lowercase().contains("auto_increment"),
    })
}

fn text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        SqlValue::Null => None,
        SqlValue::Text(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn required_text(row: &Row, key: &str) -> Result<String> {
    text(row, key).ok_or_else(|| {
        Error::DatabaseError(format!("Metadata row is missing `{}`", key))
    })
}

fn integer(row: &Row, key: &str) -> Result<i64> {
    match row.get(key) {
        Some(SqlValue::Int(n)) => Ok(*n),
        Some(SqlValue::Bool(b)) => Ok(i64::from(*b)),
        Some(SqlValue::Text(s)) => s.trim().parse::<i64>().map_err(|_| {
            Error::DatabaseError(format!("Metadata field `{}` is not an integer: {}", key, s))
        }),
        _ => Err(Error::DatabaseError(format!(
            "Metadata row is missing integer `{}`",
            key
        ))),
    }
}

fn action(row: &Row, key: &str) -> Result<ReferentialAction> {
    let raw = required_text(row, key)?;
    ReferentialAction::parse(&raw).ok_or_else(|| {
        Error::DatabaseError(format!("Unknown referential action `{}`", raw))
    })
}
