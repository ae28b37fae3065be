//! Schema difference calculator
//!
//! This module compares a target table schema against the live one and
//! calculates the column changes needed to reconcile them

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::query::value::DefaultValue;
use crate::schema::type_mapper::TypeMapper;
use crate::schema::types::{ColumnSpec, TableSchema};

/// Safety policy for a diff
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffPolicy {
    /// Live columns missing from the target are dropped only when set
    pub allow_column_removal: bool,
    /// Propose NULL -> NOT NULL tightening
    pub enforce_not_null: bool,
    /// Default given to added NOT NULL columns that declare none
    pub default_for_new_not_null_columns: Option<DefaultValue>,
}

/// A column whose live definition must be replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub from: ColumnSpec,
    pub to: ColumnSpec,
}

/// Represents changes needed to bring one table in line with its target.
///
/// A column never appears in more than one of the lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Set when the table does not exist yet; the lists are then empty
    pub create_table: Option<TableSchema>,
    pub columns_to_add: Vec<ColumnSpec>,
    /// Lowercased added column name to the target column before it;
    /// `None` places the column first
    #[serde(default)]
    pub column_predecessors: HashMap<String, Option<String>>,
    pub columns_to_modify: Vec<ColumnChange>,
    pub columns_to_remove: Vec<ColumnSpec>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.create_table.is_none()
            && self.columns_to_add.is_empty()
            && self.columns_to_modify.is_empty()
            && self.columns_to_remove.is_empty()
    }
}

/// Compares target and live schemas
pub struct SchemaDiffEngine<'a> {
    type_mapper: &'a TypeMapper,
}

impl<'a> SchemaDiffEngine<'a> {
    pub fn new(type_mapper: &'a TypeMapper) -> Self {
        Self { type_mapper }
    }

    /// Generate the diff that turns `live` into `target` under `policy`
    pub fn diff(
        &self,
        target: &TableSchema,
        live: Option<&TableSchema>,
        policy: &DiffPolicy,
    ) -> SchemaDiff {
        let Some(live) = live else {
            tracing::debug!(table = %target.table_name, "Table is absent, planning CREATE TABLE");
            return SchemaDiff {
                create_table: Some(target.clone()),
                ..SchemaDiff::default()
            };
        };

        // Map columns by lowercased name for comparison
        let live_columns: HashMap<String, &ColumnSpec> = live
            .columns
            .iter()
            .map(|col| (col.name.to_lowercase(), col))
            .collect();

        let mut columns_to_add = Vec::new();
        let mut column_predecessors = HashMap::new();
        let mut columns_to_modify = Vec::new();
        let mut previous: Option<&str> = None;

        for target_col in &target.columns {
            match live_columns.get(&target_col.name.to_lowercase()) {
                None => {
                    column_predecessors.insert(
                        target_col.name.to_lowercase(),
                        previous.map(str::to_string),
                    );
                    columns_to_add.push(self.column_to_add(target, target_col, policy));
                }
                Some(live_col) => {
                    if let Some(change) = self.column_change(live_col, target_col, policy) {
                        columns_to_modify.push(change);
                    }
                }
            }
            previous = Some(target_col.name.as_str());
        }

        let mut columns_to_remove = Vec::new();
        for live_col in &live.columns {
            if target.has_column(&live_col.name) {
                continue;
            }
            if policy.allow_column_removal {
                columns_to_remove.push(live_col.clone());
            } else {
                tracing::info!(
                    table = %target.table_name,
                    column = %live_col.name,
                    "Column is not declared; keeping it because column removal is disabled"
                );
            }
        }

        let diff = SchemaDiff {
            create_table: None,
            columns_to_add,
            column_predecessors,
            columns_to_modify,
            columns_to_remove,
        };

        tracing::debug!(
            table = %target.table_name,
            add = diff.columns_to_add.len(),
            modify = diff.columns_to_modify.len(),
            remove = diff.columns_to_remove.len(),
            "Calculated schema diff"
        );

        diff
    }

    fn column_to_add(
        &self,
        target: &TableSchema,
        column: &ColumnSpec,
        policy: &DiffPolicy,
    ) -> ColumnSpec {
        let mut column = column.clone();
        if !column.nullable && column.default_value.is_none() && !column.is_auto_increment {
            match &policy.default_for_new_not_null_columns {
                Some(default) => column.default_value = Some(default.clone()),
                None => tracing::warn!(
                    table = %target.table_name,
                    column = %column.name,
                    "Adding a NOT NULL column without a default"
                ),
            }
        }
        column
    }

    /// One combined change per column, or none when the live column
    /// already satisfies the target
    fn column_change(
        &self,
        live: &ColumnSpec,
        target: &ColumnSpec,
        policy: &DiffPolicy,
    ) -> Option<ColumnChange> {
        let type_mismatch = !self.type_mapper.is_compatible(&live.sql_type, &target.sql_type);
        let loosens = !live.nullable && target.nullable;
        let tightens = live.nullable && !target.nullable;
        let nullability_mismatch = loosens || (tightens && policy.enforce_not_null);

        if !type_mismatch && !nullability_mismatch {
            return None;
        }

        let mut to = target.clone();
        // MODIFY restates the whole definition; keep what the policy may not change
        if tightens && !policy.enforce_not_null {
            to.nullable = true;
        }
        if live.is_auto_increment {
            to.is_auto_increment = true;
        }

        Some(ColumnChange {
            from: live.clone(),
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users_target() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnSpec::new("id", "INT").auto_increment(),
                ColumnSpec::new("name", "VARCHAR(255)"),
                ColumnSpec::new("email", "VARCHAR(255)").nullable(true),
            ],
            vec![],
            vec![],
        )
        .unwrap()
    }

    /// The same table as MySQL reports it back
    fn users_live() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnSpec::new("id", "int(11)").auto_increment(),
                ColumnSpec::new("name", "varchar(255)"),
                ColumnSpec::new("email", "varchar(255)").nullable(true),
            ],
            vec![],
            vec![],
        )
        .unwrap()
    }

    fn diff(target: &TableSchema, live: Option<&TableSchema>, policy: &DiffPolicy) -> SchemaDiff {
        let mapper = TypeMapper::default();
        SchemaDiffEngine::new(&mapper).diff(target, live, policy)
    }

    #[test]
    fn absent_table_is_created() {
        let target = users_target();
        let result = diff(&target, None, &DiffPolicy::default());
        assert_eq!(result.create_table, Some(target));
        assert!(result.columns_to_add.is_empty());
    }

    #[test]
    fn matching_schema_produces_empty_diff() {
        let result = diff(&users_target(), Some(&users_live()), &DiffPolicy::default());
        assert!(result.is_empty());
    }

    #[test]
    fn new_nullable_column_is_the_only_change() {
        let mut columns = users_target().columns;
        columns.push(ColumnSpec::new("phone", "VARCHAR(20)").nullable(true));
        let target = TableSchema::new("users", columns, vec![], vec![]).unwrap();

        let result = diff(&target, Some(&users_live()), &DiffPolicy::default());
        assert_eq!(
            result.columns_to_add,
            vec![ColumnSpec::new("phone", "VARCHAR(20)").nullable(true)]
        );
        assert!(result.columns_to_modify.is_empty());
        assert!(result.columns_to_remove.is_empty());
        assert_eq!(
            result.column_predecessors.get("phone"),
            Some(&Some("email".to_string()))
        );
    }

    #[test]
    fn removal_requires_opt_in() {
        let mut columns = users_live().columns;
        columns.push(ColumnSpec::new("legacy_flag", "tinyint(1)"));
        let live = TableSchema::new("users", columns, vec![], vec![]).unwrap();

        let kept = diff(&users_target(), Some(&live), &DiffPolicy::default());
        assert!(kept.is_empty());

        let policy = DiffPolicy {
            allow_column_removal: true,
            ..DiffPolicy::default()
        };
        let removed = diff(&users_target(), Some(&live), &policy);
        assert_eq!(removed.columns_to_remove.len(), 1);
        assert_eq!(removed.columns_to_remove[0].name, "legacy_flag");
    }

    #[test]
    fn type_and_nullability_mismatch_is_one_change() {
        let live = TableSchema::new(
            "users",
            vec![
                ColumnSpec::new("id", "int(11)").auto_increment(),
                ColumnSpec::new("name", "varchar(100)").nullable(true),
                ColumnSpec::new("email", "varchar(255)").nullable(true),
            ],
            vec![],
            vec![],
        )
        .unwrap();
        let policy = DiffPolicy {
            enforce_not_null: true,
            ..DiffPolicy::default()
        };

        let result = diff(&users_target(), Some(&live), &policy);
        assert_eq!(result.columns_to_modify.len(), 1);
        let change = &result.columns_to_modify[0];
        assert_eq!(change.from.sql_type, "varchar(100)");
        assert_eq!(change.to, ColumnSpec::new("name", "VARCHAR(255)"));
    }

    #[test]
    fn tightening_needs_enforce_not_null() {
        let live = TableSchema::new(
            "users",
            vec![
                ColumnSpec::new("id", "int").auto_increment(),
                ColumnSpec::new("name", "varchar(255)").nullable(true),
                ColumnSpec::new("email", "varchar(255)").nullable(true),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        assert!(diff(&users_target(), Some(&live), &DiffPolicy::default()).is_empty());

        let policy = DiffPolicy {
            enforce_not_null: true,
            ..DiffPolicy::default()
        };
        let result = diff(&users_target(), Some(&live), &policy);
        assert_eq!(result.columns_to_modify.len(), 1);
        assert!(!result.columns_to_modify[0].to.nullable);
    }

    #[test]
    fn type_change_keeps_live_nullability_when_not_enforced() {
        let live = TableSchema::new(
            "users",
            vec![
                ColumnSpec::new("id", "int").auto_increment(),
                ColumnSpec::new("name", "varchar(64)").nullable(true),
                ColumnSpec::new("email", "varchar(255)").nullable(true),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        let result = diff(&users_target(), Some(&live), &DiffPolicy::default());
        assert_eq!(result.columns_to_modify.len(), 1);
        let to = &result.columns_to_modify[0].to;
        assert_eq!(to.sql_type, "VARCHAR(255)");
        assert!(to.nullable);
    }

    #[test]
    fn loosening_is_always_proposed() {
        let live = TableSchema::new(
            "users",
            vec![
                ColumnSpec::new("id", "int").auto_increment(),
                ColumnSpec::new("name", "varchar(255)"),
                ColumnSpec::new("email", "varchar(255)"),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        let result = diff(&users_target(), Some(&live), &DiffPolicy::default());
        assert_eq!(result.columns_to_modify.len(), 1);
        assert_eq!(result.columns_to_modify[0].to.name, "email");
        assert!(result.columns_to_modify[0].to.nullable);
    }

    #[test]
    fn live_auto_increment_is_preserved() {
        let target = TableSchema::new(
            "users",
            vec![ColumnSpec::new("id", "BIGINT").primary_key()],
            vec![],
            vec![],
        )
        .unwrap();
        let live = TableSchema::new(
            "users",
            vec![ColumnSpec::new("id", "int(11)").auto_increment()],
            vec![],
            vec![],
        )
        .unwrap();

        let result = diff(&target, Some(&live), &DiffPolicy::default());
        assert!(result.columns_to_modify[0].to.is_auto_increment);
    }

    #[test]
    fn names_match_case_insensitively() {
        let live = TableSchema::new(
            "users",
            vec![
                ColumnSpec::new("ID", "int").auto_increment(),
                ColumnSpec::new("Name", "varchar(255)"),
                ColumnSpec::new("EMAIL", "varchar(255)").nullable(true),
            ],
            vec![],
            vec![],
        )
        .unwrap();
        assert!(diff(&users_target(), Some(&live), &DiffPolicy::default()).is_empty());
    }

    #[test]
    fn mariadb_json_column_is_already_in_sync() {
        let mut target_columns = users_target().columns;
        target_columns.push(ColumnSpec::new("meta", "JSON").nullable(true));
        let target = TableSchema::new("users", target_columns, vec![], vec![]).unwrap();

        let mut live_columns = users_live().columns;
        live_columns.push(ColumnSpec::new("meta", "longtext").nullable(true));
        let live = TableSchema::new("users", live_columns, vec![], vec![]).unwrap();

        assert!(diff(&target, Some(&live), &DiffPolicy::default()).is_empty());
    }

    #[test]
    fn policy_default_fills_new_not_null_columns() {
        let mut columns = users_target().columns;
        columns.push(ColumnSpec::new("status", "VARCHAR(16)"));
        let target = TableSchema::new("users", columns, vec![], vec![]).unwrap();
        let policy = DiffPolicy {
            default_for_new_not_null_columns: Some(DefaultValue::literal("")),
            ..DiffPolicy::default()
        };

        let result = diff(&target, Some(&users_live()), &policy);
        assert_eq!(
            result.columns_to_add[0].default_value,
            Some(DefaultValue::literal(""))
        );
    }
}
