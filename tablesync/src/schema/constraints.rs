//! Secondary schema objects: unique constraints, indexes and foreign keys
//!
//! Unique constraints are prechecked for duplicate values before any DDL
//! runs. The check and the ALTER are separate statements, so a concurrent
//! writer can still insert a duplicate in between; the ALTER then fails and
//! surfaces as a `DdlExecutionError`. Run migrations while writers are
//! stopped.

use serde::Serialize;

use crate::db::executor::SqlExecutor;
use crate::error::{DuplicateGroup, Error, Result};
use crate::query::value::SqlValue;
use crate::schema::generator::{
    add_foreign_key_sql, add_index_sql, drop_foreign_key_sql, drop_index_sql,
};
use crate::schema::migrator::FailedStatement;
use crate::schema::reader::LiveSchemaReader;
use crate::schema::types::{ConstraintSet, ForeignKeySpec, IndexSpec};
use crate::utils::naming::{quote_identifier, quote_identifiers};

/// Most duplicate groups reported per constraint
const DUPLICATE_SAMPLE_LIMIT: usize = 100;

/// What a constraint run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintResult {
    /// Executed DROP statements
    pub dropped: Vec<String>,
    /// Executed ADD statements
    pub added: Vec<String>,
    /// Declared objects left alone, with the reason
    pub skipped: Vec<String>,
    /// The statement that stopped the run; everything listed above it ran
    pub failed: Option<FailedStatement>,
}

impl ConstraintResult {
    /// The result itself, or `DdlExecutionError` for the failing statement
    pub fn into_result(mut self) -> Result<Self> {
        match self.failed.take() {
            None => Ok(self),
            Some(failed) => Err(Error::DdlExecutionError {
                statement: failed.statement,
                message: failed.message,
            }),
        }
    }
}

/// Ordered statements for reconciling declared objects with live ones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintPlan {
    /// Foreign keys, then unique indexes, then plain indexes
    pub drops: Vec<String>,
    /// Unique indexes, then plain indexes, then foreign keys
    pub adds: Vec<String>,
    /// Unique indexes that must pass the duplicate precheck
    pub unique_checks: Vec<IndexSpec>,
    pub skipped: Vec<String>,
}

impl ConstraintPlan {
    pub fn is_empty(&self) -> bool {
        self.drops.is_empty() && self.adds.is_empty()
    }
}

/// Applies and removes secondary schema objects
pub struct ConstraintApplier;

impl ConstraintApplier {
    /// Reconcile the declared constraint set with the live table.
    ///
    /// With `remove_obsolete`, live objects that are not declared are
    /// dropped and objects whose definition changed are recreated. A failing
    /// DROP or ADD stops the run and lands in `failed`; the statements before
    /// it stay applied and are listed in the result.
    pub async fn apply(
        executor: &dyn SqlExecutor,
        table_name: &str,
        constraints: &ConstraintSet,
        remove_obsolete: bool,
    ) -> Result<ConstraintResult> {
        let plan = Self::plan(executor, table_name, constraints, remove_obsolete).await?;

        // Every precheck runs before the first DROP or ADD
        for index in &plan.unique_checks {
            Self::check_duplicates(executor, table_name, index).await?;
        }

        let mut result = ConstraintResult {
            skipped: plan.skipped,
            ..ConstraintResult::default()
        };

        for statement in plan.drops {
            if let Err(failed) = run_statement(executor, table_name, &statement).await {
                result.failed = Some(failed);
                return Ok(result);
            }
            result.dropped.push(statement);
        }
        for statement in plan.adds {
            if let Err(failed) = run_statement(executor, table_name, &statement).await {
                result.failed = Some(failed);
                return Ok(result);
            }
            result.added.push(statement);
        }

        tracing::info!(
            table = table_name,
            dropped = result.dropped.len(),
            added = result.added.len(),
            skipped = result.skipped.len(),
            "Applied constraints"
        );

        Ok(result)
    }

    /// Read the live objects and plan the statements without running any
    pub async fn plan(
        executor: &dyn SqlExecutor,
        table_name: &str,
        constraints: &ConstraintSet,
        remove_obsolete: bool,
    ) -> Result<ConstraintPlan> {
        let live_indexes = LiveSchemaReader::read_indexes(executor, table_name).await?;
        let live_fks = LiveSchemaReader::read_foreign_keys(executor, table_name).await?;
        Ok(plan_changes(
            table_name,
            constraints,
            &live_indexes,
            &live_fks,
            remove_obsolete,
        ))
    }

    /// Fail with `DuplicateValueError` when existing rows would violate
    /// the unique index
    pub async fn check_duplicates(
        executor: &dyn SqlExecutor,
        table_name: &str,
        index: &IndexSpec,
    ) -> Result<()> {
        let sql = duplicate_check_sql(table_name, &index.columns);
        let rows = executor.fetch_all(&sql, &[]).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let groups: Vec<DuplicateGroup> = rows
            .iter()
            .map(|row| {
                let values: Vec<SqlValue> =
                    row.values().take(index.columns.len()).cloned().collect();
                let count = match row.get("duplicate_count") {
                    Some(SqlValue::Int(n)) => *n,
                    Some(SqlValue::Text(s)) => s.parse::<i64>().unwrap_or(0),
                    _ => 0,
                };
                DuplicateGroup { values, count }
            })
            .collect();

        tracing::warn!(
            table = table_name,
            constraint = %index.name,
            groups = groups.len(),
            "Existing rows violate unique constraint"
        );

        Err(Error::DuplicateValueError {
            table: table_name.to_string(),
            constraint: index.name.clone(),
            columns: index.columns.clone(),
            groups,
        })
    }
}

async fn run_statement(
    executor: &dyn SqlExecutor,
    table_name: &str,
    statement: &str,
) -> std::result::Result<(), FailedStatement> {
    tracing::info!(table = table_name, sql = statement, "Executing constraint statement");
    executor.execute(statement).await.map(|_| ()).map_err(|e| {
        tracing::error!(
            table = table_name,
            sql = statement,
            error = %e,
            "Constraint statement failed; earlier statements stay applied"
        );
        FailedStatement {
            statement: statement.to_string(),
            message: e.to_string(),
        }
    })
}

pub fn duplicate_check_sql(table_name: &str, columns: &[String]) -> String {
    let not_null = columns
        .iter()
        .map(|c| format!("{} IS NOT NULL", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(" AND ");
    let cols = quote_identifiers(columns);

    format!(
        "SELECT {cols}, COUNT(*) AS duplicate_count FROM {table} WHERE {not_null} \
         GROUP BY {cols} HAVING COUNT(*) > 1 LIMIT {limit}",
        cols = cols,
        table = quote_identifier(table_name),
        not_null = not_null,
        limit = DUPLICATE_SAMPLE_LIMIT
    )
}

/// Compare declared objects with live ones and order the resulting DDL
pub fn plan_changes(
    table_name: &str,
    declared: &ConstraintSet,
    live_indexes: &[IndexSpec],
    live_fks: &[ForeignKeySpec],
    remove_obsolete: bool,
) -> ConstraintPlan {
    let mut plan = ConstraintPlan::default();

    let mut drop_fks: Vec<&ForeignKeySpec> = Vec::new();
    let mut add_fks: Vec<&ForeignKeySpec> = Vec::new();
    for fk in &declared.foreign_keys {
        match live_fks.iter().find(|l| l.name.eq_ignore_ascii_case(&fk.name)) {
            None => add_fks.push(fk),
            Some(live) if live.same_definition(fk) => {}
            Some(live) if remove_obsolete => {
                drop_fks.push(live);
                add_fks.push(fk);
            }
            Some(_) => plan.skipped.push(format!(
                "foreign key `{}` differs from its live definition; enable sync_schema to recreate it",
                fk.name
            )),
        }
    }
    if remove_obsolete {
        for live in live_fks {
            let declared_fk = declared
                .foreign_keys
                .iter()
                .any(|fk| fk.name.eq_ignore_ascii_case(&live.name));
            if !declared_fk {
                drop_fks.push(live);
            }
        }
    }

    // Live foreign keys that survive this run keep their backing index
    let kept_fk_names: Vec<&str> = live_fks
        .iter()
        .filter(|live| !drop_fks.iter().any(|d| d.name.eq_ignore_ascii_case(&live.name)))
        .map(|live| live.name.as_str())
        .collect();
    let backs_kept_fk = |name: &str| kept_fk_names.iter().any(|k| k.eq_ignore_ascii_case(name));

    let mut drop_indexes: Vec<&IndexSpec> = Vec::new();
    let mut add_indexes: Vec<&IndexSpec> = Vec::new();
    for index in &declared.indexes {
        match live_indexes.iter().find(|l| l.name.eq_ignore_ascii_case(&index.name)) {
            None => add_indexes.push(index),
            Some(live) if live.same_definition(index) => {}
            Some(live) if remove_obsolete && !backs_kept_fk(&live.name) => {
                drop_indexes.push(live);
                add_indexes.push(index);
            }
            Some(_) => plan.skipped.push(format!(
                "index `{}` differs from its live definition; enable sync_schema to recreate it",
                index.name
            )),
        }
    }
    if remove_obsolete {
        for live in live_indexes {
            let declared_index = declared
                .indexes
                .iter()
                .any(|i| i.name.eq_ignore_ascii_case(&live.name));
            if !declared_index && !backs_kept_fk(&live.name) {
                drop_indexes.push(live);
            }
        }
    }

    for fk in &drop_fks {
        plan.drops.push(drop_foreign_key_sql(table_name, &fk.name));
    }
    for unique in [true, false] {
        for index in drop_indexes.iter().filter(|i| i.unique == unique) {
            plan.drops.push(drop_index_sql(table_name, &index.name));
        }
    }

    for unique in [true, false] {
        for index in add_indexes.iter().filter(|i| i.unique == unique) {
            plan.adds.push(add_index_sql(table_name, index));
            if unique {
                plan.unique_checks.push((*index).clone());
            }
        }
    }
    for fk in &add_fks {
        plan.adds.push(add_foreign_key_sql(table_name, fk));
    }

    plan
}
