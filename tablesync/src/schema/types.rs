//! Type definitions for table schema objects

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::query::value::DefaultValue;
use crate::utils::naming::check_identifier_conflicts;

/// A table: ordered columns plus secondary objects.
///
/// Built once per migration run and never mutated afterwards. Construction
/// through [`TableSchema::new`] checks the column invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
    pub indexes: Vec<IndexSpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl TableSchema {
    /// Create a table schema, checking that column names are unique
    /// case-insensitively and that at most one column auto-increments,
    /// which must also be the primary key
    pub fn new(
        table_name: &str,
        columns: Vec<ColumnSpec>,
        indexes: Vec<IndexSpec>,
        foreign_keys: Vec<ForeignKeySpec>,
    ) -> Result<Self> {
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        if let Some((first, second)) = check_identifier_conflicts(&names) {
            return Err(Error::IntrospectionError(format!(
                "Table `{}` declares columns `{}` and `{}` which collide",
                table_name, first, second
            )));
        }

        let auto_increment: Vec<&ColumnSpec> =
            columns.iter().filter(|c| c.is_auto_increment).collect();
        if auto_increment.len() > 1 {
            return Err(Error::IntrospectionError(format!(
                "Table `{}` has {} auto-increment columns, at most one is allowed",
                table_name,
                auto_increment.len()
            )));
        }
        if let Some(column) = auto_increment.first() {
            if !column.is_primary_key {
                return Err(Error::IntrospectionError(format!(
                    "Auto-increment column `{}` on `{}` must be the primary key",
                    column.name, table_name
                )));
            }
        }

        Ok(Self {
            table_name: table_name.to_string(),
            columns,
            indexes,
            foreign_keys,
        })
    }

    /// Find a column by name, ignoring case
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Primary key columns in declaration order
    pub fn primary_key(&self) -> Vec<&ColumnSpec> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    /// The declared secondary objects, as handed to the constraint applier
    pub fn constraints(&self) -> ConstraintSet {
        ConstraintSet {
            indexes: self.indexes.clone(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default_value: Option<DefaultValue>,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
}

impl ColumnSpec {
    /// Create a NOT NULL column with the given name and type
    pub fn new(name: &str, sql_type: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable: false,
            default_value: None,
            is_primary_key: false,
            is_auto_increment: false,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default_value = Some(default);
        self
    }

    /// Mark the column as primary key
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Mark the column as an auto-increment primary key
    pub fn auto_increment(mut self) -> Self {
        self.is_primary_key = true;
        self.is_auto_increment = true;
        self
    }
}

/// An index; unique constraints are unique indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// Same columns (ignoring case) and same uniqueness
    pub fn same_definition(&self, other: &IndexSpec) -> bool {
        self.unique == other.unique
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

/// Action taken on the referencing row when the referenced row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReferentialAction {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    NoAction,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse an action as written in DDL or reported by information_schema
    pub fn parse(action: &str) -> Option<Self> {
        let normalized = action.trim().to_uppercase().replace('_', " ");
        match normalized.as_str() {
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "NO ACTION" => Some(ReferentialAction::NoAction),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single-column foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub name: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKeySpec {
    /// Same local column and same referenced column.
    ///
    /// Actions are not compared: MySQL reports an unspecified action as
    /// either RESTRICT or NO ACTION depending on version.
    pub fn same_definition(&self, other: &ForeignKeySpec) -> bool {
        self.column.eq_ignore_ascii_case(&other.column)
            && self.ref_table.eq_ignore_ascii_case(&other.ref_table)
            && self.ref_column.eq_ignore_ascii_case(&other.ref_column)
    }
}

/// Secondary schema objects declared apart from the column list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub indexes: Vec<IndexSpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl ConstraintSet {
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty() && self.foreign_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let err = TableSchema::new(
            "users",
            vec![ColumnSpec::new("Email", "VARCHAR(255)"), ColumnSpec::new("email", "TEXT")],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, Error::IntrospectionError(_)));
    }

    #[test]
    fn auto_increment_must_be_primary_key() {
        let mut column = ColumnSpec::new("counter", "INT");
        column.is_auto_increment = true;
        let err = TableSchema::new("t", vec![column], vec![], vec![]).unwrap_err();
        assert!(err.to_string().contains("must be the primary key"));

        let err = TableSchema::new(
            "t",
            vec![
                ColumnSpec::new("a", "INT").auto_increment(),
                ColumnSpec::new("b", "INT").auto_increment(),
            ],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(err.to_string().contains("2 auto-increment columns"));
    }

    #[test]
    fn column_lookup_ignores_case() {
        let table = TableSchema::new(
            "users",
            vec![ColumnSpec::new("id", "INT").auto_increment()],
            vec![],
            vec![],
        )
        .unwrap();
        assert!(table.has_column("ID"));
        assert_eq!(table.primary_key().len(), 1);
    }

    #[test]
    fn referential_actions_parse_both_spellings() {
        assert_eq!(ReferentialAction::parse("set null"), Some(ReferentialAction::SetNull));
        assert_eq!(ReferentialAction::parse("NO_ACTION"), Some(ReferentialAction::NoAction));
        assert_eq!(ReferentialAction::parse("explode"), None);
    }
}
