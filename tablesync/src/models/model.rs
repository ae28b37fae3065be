//! Table-description values for tablesync
//!
//! A [`TableDescriptor`] is the ordered list of a struct's fields with their
//! types, nullability and hints, plus any constraint declarations. It is
//! usually produced by `#[derive(TableModel)]` but can be built by hand.

use serde::{Deserialize, Serialize};

use crate::config::NamingConfig;
use crate::query::value::DefaultValue;
use crate::schema::type_mapper::TypeHint;
use crate::schema::types::ReferentialAction;
use crate::utils::naming::{get_column_name, get_table_name};

/// A struct that describes a database table
pub trait TableModel {
    /// Describe the table: fields in declaration order plus constraints
    fn descriptor() -> TableDescriptor;
}

/// Description of a table-backing struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub struct_name: String,
    pub table_name: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub constraints: Vec<ConstraintDecl>,
}

impl TableDescriptor {
    pub fn new(struct_name: &str) -> Self {
        Self {
            struct_name: struct_name.to_string(),
            table_name: None,
            fields: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Use an explicit table name instead of the naming convention
    pub fn table_name(mut self, table_name: &str) -> Self {
        self.table_name = Some(table_name.to_string());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintDecl) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Table name: explicit, or the struct name through the naming convention
    pub fn resolved_table_name(&self, naming: &NamingConfig) -> String {
        self.table_name.clone().unwrap_or_else(|| {
            get_table_name(&self.struct_name, &naming.table_style, naming.pluralize_tables)
        })
    }

    /// Column names of all declared fields, in declaration order
    pub fn column_names(&self, column_style: &str) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.column_name(column_style))
            .collect()
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared type with any `Option` wrapper removed
    pub rust_type: String,
    pub nullable: bool,
    pub column_name: Option<String>,
    pub db_type: Option<String>,
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub primary_key: Option<bool>,
    pub auto_increment: Option<bool>,
    pub default: Option<DefaultValue>,
}

impl FieldDescriptor {
    pub fn new(name: &str, rust_type: &str) -> Self {
        Self {
            name: name.to_string(),
            rust_type: rust_type.to_string(),
            nullable: false,
            column_name: None,
            db_type: None,
            size: None,
            precision: None,
            scale: None,
            primary_key: None,
            auto_increment: None,
            default: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn column(mut self, column_name: &str) -> Self {
        self.column_name = Some(column_name.to_string());
        self
    }

    pub fn db_type(mut self, db_type: &str) -> Self {
        self.db_type = Some(db_type.to_string());
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = Some(auto_increment);
        self
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Column name: the explicit override or the field name in `column_style`
    pub fn column_name(&self, column_style: &str) -> String {
        self.column_name
            .clone()
            .unwrap_or_else(|| get_column_name(&self.name, column_style))
    }

    pub fn type_hint(&self) -> TypeHint {
        TypeHint {
            size: self.size,
            precision: self.precision,
            scale: self.scale,
        }
    }
}

/// A constraint declared on the struct. Column references use field or
/// column names; constraint names are derived from the naming patterns
/// when left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintDecl {
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    Index {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        name: Option<String>,
        column: String,
        ref_table: String,
        ref_column: String,
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    },
}

impl ConstraintDecl {
    pub fn unique(columns: &[&str]) -> Self {
        ConstraintDecl::Unique {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn index(columns: &[&str]) -> Self {
        ConstraintDecl::Index {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn foreign_key(column: &str, ref_table: &str, ref_column: &str) -> Self {
        ConstraintDecl::ForeignKey {
            name: None,
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
            on_delete: ReferentialAction::default(),
            on_update: ReferentialAction::default(),
        }
    }

    /// Set the referential actions of a foreign key declaration
    pub fn on_actions(self, delete: ReferentialAction, update: ReferentialAction) -> Self {
        match self {
            ConstraintDecl::ForeignKey {
                name,
                column,
                ref_table,
                ref_column,
                ..
            } => ConstraintDecl::ForeignKey {
                name,
                column,
                ref_table,
                ref_column,
                on_delete: delete,
                on_update: update,
            },
            other => other,
        }
    }

    /// Give the constraint an explicit name
    pub fn named(self, constraint_name: &str) -> Self {
        let explicit = Some(constraint_name.to_string());
        match self {
            ConstraintDecl::Unique { columns, .. } => ConstraintDecl::Unique {
                name: explicit,
                columns,
            },
            ConstraintDecl::Index { columns, .. } => ConstraintDecl::Index {
                name: explicit,
                columns,
            },
            ConstraintDecl::ForeignKey {
                column,
                ref_table,
                ref_column,
                on_delete,
                on_update,
                ..
            } => ConstraintDecl::ForeignKey {
                name: explicit,
                column,
                ref_table,
                ref_column,
                on_delete,
                on_update,
            },
        }
    }
}
