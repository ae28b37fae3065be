//! Models module for tablesync
//!
//! This module holds the table-description side: what a struct declares.

pub mod model;

// Re-export key types
pub use model::{ConstraintDecl, FieldDescriptor, TableDescriptor, TableModel};
