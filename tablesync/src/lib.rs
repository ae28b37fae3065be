//! tablesync: keeps MySQL tables in line with Rust struct definitions
//!
//! A struct describes its table through [`TableModel`] (usually derived).
//! tablesync reads the live table, computes a column diff under an explicit
//! safety policy, runs the DDL statement by statement, and reconciles
//! indexes and foreign keys. The same descriptor whitelists fields for
//! [`QueryBuilder`], which turns untrusted filter, sort and page input into
//! parameterized SQL.

// Lets the derive's `::tablesync::` paths resolve inside this crate too
extern crate self as tablesync;

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod schema;
pub mod utils;

use serde::Serialize;

// Re-export main types for easier access
pub use config::Config;
pub use db::{connect, DatabaseConnection, MigrationHistory, Row, SqlExecutor};
pub use error::{Error, Result};
pub use models::{ConstraintDecl, FieldDescriptor, TableDescriptor, TableModel};
pub use query::{
    BuiltQuery, ConditionTranslator, DefaultValue, FilterCondition, FilterValue, QueryBuilder,
    QuerySpec, SortDirection, SqlValue,
};
pub use schema::{
    ColumnSpec, ConstraintApplier, ConstraintResult, DiffPolicy, LiveSchemaReader,
    MigrationExecutor, MigrationResult, SchemaDiff, SchemaDiffEngine, SchemaIntrospector,
    TableSchema, TypeMapper,
};
pub use tablesync_macros::TableModel;

/// Load configuration, install logging and open the connection pool
pub async fn init(config_path: &str) -> Result<(Config, DatabaseConnection)> {
    let config = config::load_from_file(config_path)?;
    utils::logging::init_logging(&config.logging)?;
    let connection = connect(&config.database).await?;
    Ok((config, connection))
}

/// What one table sync did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub table: String,
    pub diff: SchemaDiff,
    pub dry_run: bool,
    /// Statements that would run; filled on dry runs only
    pub planned: Vec<String>,
    /// Column statements that ran
    pub executed: Vec<String>,
    pub constraints: ConstraintResult,
    pub migration_id: Option<String>,
}

impl SyncReport {
    /// Whether the run changed (or on a dry run, would change) anything
    pub fn has_changes(&self) -> bool {
        !self.planned.is_empty()
            || !self.executed.is_empty()
            || !self.constraints.added.is_empty()
            || !self.constraints.dropped.is_empty()
    }
}

/// The main client for interacting with tablesync.
///
/// Borrows the executor and configuration for its lifetime; it holds no
/// connection of its own and caches no schema between calls.
pub struct TableSyncClient<'a> {
    executor: &'a dyn SqlExecutor,
    config: &'a Config,
    type_mapper: TypeMapper,
}

impl<'a> TableSyncClient<'a> {
    pub fn new(executor: &'a dyn SqlExecutor, config: &'a Config) -> Self {
        Self {
            executor,
            config,
            type_mapper: TypeMapper::new(&config.type_mapping),
        }
    }

    /// Target schema for a descriptor
    pub fn target_schema(&self, descriptor: &TableDescriptor) -> Result<TableSchema> {
        SchemaIntrospector::new(&self.type_mapper, &self.config.naming).introspect(descriptor)
    }

    /// Read the live table and diff it against the descriptor
    pub async fn diff(&self, descriptor: &TableDescriptor) -> Result<(TableSchema, SchemaDiff)> {
        let target = self.target_schema(descriptor)?;
        let live = LiveSchemaReader::read(self.executor, &target.table_name).await?;
        let diff = SchemaDiffEngine::new(&self.type_mapper).diff(
            &target,
            live.as_ref(),
            &self.config.migrations.policy(),
        );
        Ok((target, diff))
    }

    /// Bring one table in line with its descriptor: columns first, then
    /// indexes and foreign keys.
    ///
    /// A failing statement stops the run with `DdlExecutionError`; the
    /// statements executed before it stay applied and are recorded, so
    /// running the sync again completes the job. Column and constraint
    /// statements of one run share a single migration id.
    pub async fn sync_table(&self, descriptor: &TableDescriptor) -> Result<SyncReport> {
        let (target, diff) = self.diff(descriptor).await?;
        let table = target.table_name.clone();
        let constraints = target.constraints();
        let remove_obsolete = self.config.migrations.sync_schema;

        if self.config.migrations.dry_run {
            let mut planned = MigrationExecutor::plan(&diff, &table);
            let constraint_plan =
                ConstraintApplier::plan(self.executor, &table, &constraints, remove_obsolete).await?;
            planned.extend(constraint_plan.drops);
            planned.extend(constraint_plan.adds);

            for (i, statement) in planned.iter().enumerate() {
                tracing::info!(
                    table = %table,
                    statement_number = i + 1,
                    sql = %statement,
                    "Migration SQL (dry run)"
                );
            }

            return Ok(SyncReport {
                table,
                diff,
                dry_run: true,
                planned,
                constraints: ConstraintResult {
                    skipped: constraint_plan.skipped,
                    ..ConstraintResult::default()
                },
                ..SyncReport::default()
            });
        }

        if diff.is_empty() {
            tracing::info!(table = %table, "Columns already in sync");
        }

        let column_result = MigrationExecutor::execute(self.executor, &diff, &table).await;
        let constraint_result = if column_result.is_success() {
            ConstraintApplier::apply(self.executor, &table, &constraints, remove_obsolete).await
        } else {
            Ok(ConstraintResult::default())
        };

        let mut applied = column_result.executed.clone();
        if let Ok(result) = &constraint_result {
            applied.extend(result.dropped.iter().chain(&result.added).cloned());
        }
        let migration_id = self.record_history(&table, &applied).await?;

        let executed = column_result.into_result()?;
        let constraints = constraint_result?.into_result()?;

        Ok(SyncReport {
            table,
            diff,
            dry_run: false,
            planned: Vec::new(),
            executed,
            constraints,
            migration_id,
        })
    }

    /// Shorthand for [`TableSyncClient::sync_table`] on a model type
    pub async fn sync<M: TableModel>(&self) -> Result<SyncReport> {
        self.sync_table(&M::descriptor()).await
    }

    /// Run a filtered SELECT over the descriptor's table
    pub async fn query(&self, descriptor: &TableDescriptor, spec: &QuerySpec) -> Result<Vec<Row>> {
        let built = QueryBuilder::new(&self.config.naming).select(descriptor, spec)?;
        let (sql, params) = built.to_positional();
        self.executor.fetch_all(&sql, &params).await
    }

    async fn record_history(&self, table: &str, statements: &[String]) -> Result<Option<String>> {
        let Some(history_table) = &self.config.migrations.history_table else {
            return Ok(None);
        };
        if statements.is_empty() {
            return Ok(None);
        }

        let history = MigrationHistory::new(history_table);
        history.ensure_table(self.executor).await?;
        history.record(self.executor, table, statements).await.map(Some)
    }
}
