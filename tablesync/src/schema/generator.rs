//! Migration generator
//!
//! This module renders MySQL DDL statements from schema objects. DDL takes
//! no bind parameters, so identifiers are backtick-quoted and defaults are
//! rendered as escaped literals.

use crate::schema::types::{ColumnSpec, ForeignKeySpec, IndexSpec, TableSchema};
use crate::utils::naming::{quote_identifier, quote_identifiers};

pub const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// Position of an added column relative to the existing ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPosition<'a> {
    First,
    After(&'a str),
}

/// Column definition as used in CREATE TABLE, ADD COLUMN and MODIFY COLUMN.
///
/// Never includes PRIMARY KEY; that is a table-level clause.
pub fn column_definition(column: &ColumnSpec) -> String {
    let mut def = format!("{} {}", quote_identifier(&column.name), column.sql_type);

    def.push_str(if column.nullable { " NULL" } else { " NOT NULL" });

    if let Some(default) = &column.default_value {
        def.push_str(" DEFAULT ");
        def.push_str(&default.to_sql());
    }

    if column.is_auto_increment {
        def.push_str(" AUTO_INCREMENT");
    }

    def
}

/// Generate the CREATE TABLE statement for a whole table.
///
/// Indexes and foreign keys are left to the constraint applier.
pub fn create_table_sql(table: &TableSchema) -> String {
    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|col| format!("  {}", column_definition(col)))
        .collect();

    let pk: Vec<String> = table
        .primary_key()
        .iter()
        .map(|col| col.name.clone())
        .collect();
    if !pk.is_empty() {
        defs.push(format!("  PRIMARY KEY ({})", quote_identifiers(&pk)));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n) {}",
        quote_identifier(&table.table_name),
        defs.join(",\n"),
        TABLE_OPTIONS
    )
}

/// ADD COLUMN; without a position the column is appended
pub fn add_column_sql(
    table_name: &str,
    column: &ColumnSpec,
    position: Option<ColumnPosition<'_>>,
) -> String {
    let mut def = column_definition(column);
    // An auto-increment column needs a key in the same statement
    if column.is_auto_increment {
        def.push_str(" PRIMARY KEY");
    }

    match position {
        Some(ColumnPosition::First) => def.push_str(" FIRST"),
        Some(ColumnPosition::After(previous)) => {
            def.push_str(" AFTER ");
            def.push_str(&quote_identifier(previous));
        }
        None => {}
    }

    format!("ALTER TABLE {} ADD COLUMN {}", quote_identifier(table_name), def)
}

pub fn modify_column_sql(table_name: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {}",
        quote_identifier(table_name),
        column_definition(column)
    )
}

pub fn drop_column_sql(table_name: &str, column_name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_identifier(table_name),
        quote_identifier(column_name)
    )
}

/// ADD CONSTRAINT ... UNIQUE for unique indexes, ADD INDEX otherwise
pub fn add_index_sql(table_name: &str, index: &IndexSpec) -> String {
    if index.unique {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            quote_identifier(table_name),
            quote_identifier(&index.name),
            quote_identifiers(&index.columns)
        )
    } else {
        format!(
            "ALTER TABLE {} ADD INDEX {} ({})",
            quote_identifier(table_name),
            quote_identifier(&index.name),
            quote_identifiers(&index.columns)
        )
    }
}

pub fn drop_index_sql(table_name: &str, index_name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP INDEX {}",
        quote_identifier(table_name),
        quote_identifier(index_name)
    )
}

pub fn add_foreign_key_sql(table_name: &str, fk: &ForeignKeySpec) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        quote_identifier(table_name),
        quote_identifier(&fk.name),
        quote_identifier(&fk.column),
        quote_identifier(&fk.ref_table),
        quote_identifier(&fk.ref_column),
        fk.on_delete,
        fk.on_update
    )
}

pub fn drop_foreign_key_sql(table_name: &str, fk_name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP FOREIGN KEY {}",
        quote_identifier(table_name),
        quote_identifier(fk_name)
    )
}
