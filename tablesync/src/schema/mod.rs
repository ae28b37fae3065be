//! Schema module for tablesync
//!
//! This module handles target schema construction, live schema reading,
//! comparison, and DDL generation and execution.

pub mod constraints;
pub mod diff;
pub mod generator;
pub mod introspector;
pub mod migrator;
pub mod reader;
pub mod type_mapper;
pub mod types;

// Re-export key types
pub use constraints::{ConstraintApplier, ConstraintPlan, ConstraintResult};
pub use diff::{ColumnChange, DiffPolicy, SchemaDiff, SchemaDiffEngine};
pub use introspector::SchemaIntrospector;
pub use migrator::{FailedStatement, MigrationExecutor, MigrationResult};
pub use reader::LiveSchemaReader;
pub use type_mapper::{TypeHint, TypeMapper};
pub use types::{
    ColumnSpec, ConstraintSet, ForeignKeySpec, IndexSpec, ReferentialAction, TableSchema,
};
