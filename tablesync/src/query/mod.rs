//! Query module for tablesync
//!
//! Builds parameterized SELECTs from untrusted filter, sort and page input.

pub mod builder;
pub mod condition;
pub mod spec;
pub mod value;

// Re-export key types
pub use builder::{BuiltQuery, QueryBuilder};
pub use condition::{ConditionTranslator, Operator, SqlOperatorFragment};
pub use spec::{FilterCondition, FilterValue, QuerySpec, SortDirection};
pub use value::{DefaultValue, SqlValue};
