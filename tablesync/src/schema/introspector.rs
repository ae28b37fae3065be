//! Target schema construction from table descriptors

use std::collections::HashSet;

use crate::config::NamingConfig;
use crate::error::{Error, Result};
use crate::models::model::{ConstraintDecl, FieldDescriptor, TableDescriptor};
use crate::schema::type_mapper::TypeMapper;
use crate::schema::types::{ColumnSpec, ForeignKeySpec, IndexSpec, TableSchema};
use crate::utils::naming::{get_foreign_key_name, get_index_name};

/// Builds the target [`TableSchema`] a descriptor asks for
pub struct SchemaIntrospector<'a> {
    type_mapper: &'a TypeMapper,
    naming: &'a NamingConfig,
}

impl<'a> SchemaIntrospector<'a> {
    pub fn new(type_mapper: &'a TypeMapper, naming: &'a NamingConfig) -> Self {
        Self { type_mapper, naming }
    }

    /// Table name: explicit, or the struct name through the naming convention
    pub fn table_name(&self, descriptor: &TableDescriptor) -> String {
        descriptor.resolved_table_name(self.naming)
    }

    /// Produce the target schema, columns in declaration order
    pub fn introspect(&self, descriptor: &TableDescriptor) -> Result<TableSchema> {
        let table_name = self.table_name(descriptor);

        if descriptor.fields.is_empty() {
            return Err(Error::IntrospectionError(format!(
                "`{}` declares no fields",
                descriptor.struct_name
            )));
        }

        // An explicit primary key anywhere switches the `id` convention off
        let explicit_pk = descriptor.fields.iter().any(|f| f.primary_key == Some(true));

        let columns = descriptor
            .fields
            .iter()
            .map(|field| self.column_for(field, explicit_pk))
            .collect::<Result<Vec<_>>>()?;

        let mut indexes = Vec::new();
        let mut foreign_keys = Vec::new();
        let mut constraint_names = HashSet::new();

        for decl in &descriptor.constraints {
            match decl {
                ConstraintDecl::Unique { name, columns: refs }
                | ConstraintDecl::Index { name, columns: refs } => {
                    let unique = matches!(decl, ConstraintDecl::Unique { .. });
                    if refs.is_empty() {
                        return Err(Error::IntrospectionError(format!(
                            "An index on `{}` lists no columns",
                            table_name
                        )));
                    }
                    let resolved = refs
                        .iter()
                        .map(|r| self.resolve_column(descriptor, &table_name, r))
                        .collect::<Result<Vec<_>>>()?;
                    let pattern = if unique {
                        &self.naming.unique_pattern
                    } else {
                        &self.naming.index_pattern
                    };
                    let index_name = name
                        .clone()
                        .unwrap_or_else(|| get_index_name(pattern, &table_name, &resolved));

                    register_name(&mut constraint_names, &table_name, &index_name)?;
                    indexes.push(IndexSpec {
                        name: index_name,
                        columns: resolved,
                        unique,
                    });
                }
                ConstraintDecl::ForeignKey {
                    name,
                    column,
                    ref_table,
                    ref_column,
                    on_delete,
                    on_update,
                } => {
                    let resolved = self.resolve_column(descriptor, &table_name, column)?;
                    let fk_name = name.clone().unwrap_or_else(|| {
                        get_foreign_key_name(&self.naming.foreign_key_pattern, &table_name, &resolved)
                    });

                    register_name(&mut constraint_names, &table_name, &fk_name)?;
                    foreign_keys.push(ForeignKeySpec {
                        name: fk_name,
                        column: resolved,
                        ref_table: ref_table.clone(),
                        ref_column: ref_column.clone(),
                        on_delete: *on_delete,
                        on_update: *on_update,
                    });
                }
            }
        }

        tracing::debug!(
            table = %table_name,
            columns = columns.len(),
            indexes = indexes.len(),
            foreign_keys = foreign_keys.len(),
            "Introspected table descriptor"
        );

        TableSchema::new(&table_name, columns, indexes, foreign_keys)
    }

    fn column_for(&self, field: &FieldDescriptor, explicit_pk: bool) -> Result<ColumnSpec> {
        let name = field.column_name(&self.naming.column_style);
        if name.is_empty() {
            return Err(Error::IntrospectionError(format!(
                "Field `{}` maps to an empty column name",
                field.name
            )));
        }

        let sql_type = match &field.db_type {
            Some(db_type) => db_type.clone(),
            None => self
                .type_mapper
                .to_column_type(&field.rust_type, &field.type_hint())?,
        };

        let is_id = name.eq_ignore_ascii_case("id");
        let is_primary_key = field.primary_key.unwrap_or(!explicit_pk && is_id);
        let is_auto_increment = field.auto_increment.unwrap_or(
            is_primary_key && is_id && TypeMapper::is_integer_type(&field.rust_type),
        );

        Ok(ColumnSpec {
            name,
            sql_type,
            // MySQL forces primary key columns NOT NULL; an Option id is an unsaved row
            nullable: field.nullable && !is_primary_key,
            default_value: field.default.clone(),
            is_primary_key,
            is_auto_increment,
        })
    }

    /// Map a field or column reference to its column name
    fn resolve_column(
        &self,
        descriptor: &TableDescriptor,
        table_name: &str,
        reference: &str,
    ) -> Result<String> {
        descriptor
            .fields
            .iter()
            .find_map(|field| {
                let column = field.column_name(&self.naming.column_style);
                (field.name == reference || column.eq_ignore_ascii_case(reference))
                    .then_some(column)
            })
            .ok_or_else(|| {
                Error::IntrospectionError(format!(
                    "Constraint on `{}` references undeclared column `{}`",
                    table_name, reference
                ))
            })
    }
}

fn register_name(names: &mut HashSet<String>, table_name: &str, name: &str) -> Result<()> {
    if names.insert(name.to_lowercase()) {
        Ok(())
    } else {
        Err(Error::IntrospectionError(format!(
            "Constraint name `{}` is declared twice on `{}`",
            name, table_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::value::DefaultValue;
    use crate::schema::types::ReferentialAction;
    use pretty_assertions::assert_eq;

    fn users() -> TableDescriptor {
        TableDescriptor::new("User")
            .field(FieldDescriptor::new("id", "i64"))
            .field(FieldDescriptor::new("name", "String"))
            .field(FieldDescriptor::new("email", "String").nullable(true))
    }

    fn introspect(descriptor: &TableDescriptor) -> Result<TableSchema> {
        let mapper = TypeMapper::default();
        let naming = NamingConfig::default();
        SchemaIntrospector::new(&mapper, &naming).introspect(descriptor)
    }

    #[test]
    fn id_convention_gives_auto_increment_primary_key() {
        let schema = introspect(&users()).unwrap();

        assert_eq!(schema.table_name, "users");
        assert_eq!(
            schema.columns,
            vec![
                ColumnSpec::new("id", "BIGINT").auto_increment(),
                ColumnSpec::new("name", "VARCHAR(255)"),
                ColumnSpec::new("email", "VARCHAR(255)").nullable(true),
            ]
        );
    }

    #[test]
    fn explicit_primary_key_disables_convention() {
        let descriptor = TableDescriptor::new("Session")
            .field(FieldDescriptor::new("id", "i64"))
            .field(FieldDescriptor::new("token", "String").size(64).primary_key(true));
        let schema = introspect(&descriptor).unwrap();

        assert!(!schema.columns[0].is_primary_key);
        assert!(!schema.columns[0].is_auto_increment);
        assert!(schema.columns[1].is_primary_key);
        assert!(!schema.columns[1].is_auto_increment);
    }

    #[test]
    fn id_can_opt_out() {
        let descriptor = TableDescriptor::new("Setting")
            .field(FieldDescriptor::new("id", "i32").auto_increment(false))
            .field(FieldDescriptor::new("value", "String"));
        let schema = introspect(&descriptor).unwrap();
        assert!(schema.columns[0].is_primary_key);
        assert!(!schema.columns[0].is_auto_increment);
    }

    #[test]
    fn nullable_primary_key_becomes_not_null() {
        let descriptor = TableDescriptor::new("User")
            .field(FieldDescriptor::new("id", "i64").nullable(true))
            .field(FieldDescriptor::new("name", "String"));
        let schema = introspect(&descriptor).unwrap();
        assert!(!schema.columns[0].nullable);
    }

    #[test]
    fn column_overrides_and_defaults_are_kept() {
        let descriptor = TableDescriptor::new("Post")
            .table_name("blog_posts")
            .field(FieldDescriptor::new("id", "u32"))
            .field(FieldDescriptor::new("body", "String").db_type("TEXT"))
            .field(
                FieldDescriptor::new("status", "String")
                    .size(16)
                    .default_value(DefaultValue::literal("draft")),
            )
            .field(FieldDescriptor::new("createdAt", "chrono::NaiveDateTime"));
        let schema = introspect(&descriptor).unwrap();

        assert_eq!(schema.table_name, "blog_posts");
        assert_eq!(schema.columns[0].sql_type, "INT UNSIGNED");
        assert_eq!(schema.columns[1].sql_type, "TEXT");
        assert_eq!(schema.columns[2].sql_type, "VARCHAR(16)");
        assert_eq!(schema.columns[2].default_value, Some(DefaultValue::literal("draft")));
        assert_eq!(schema.columns[3].name, "created_at");
    }

    #[test]
    fn empty_descriptor_fails() {
        let err = introspect(&TableDescriptor::new("Nothing")).unwrap_err();
        assert!(matches!(err, Error::IntrospectionError(_)));
    }

    #[test]
    fn colliding_column_names_fail() {
        let descriptor = TableDescriptor::new("User")
            .field(FieldDescriptor::new("userName", "String"))
            .field(FieldDescriptor::new("user_name", "String"));
        let err = introspect(&descriptor).unwrap_err();
        assert!(matches!(err, Error::IntrospectionError(_)));
    }

    #[test]
    fn constraints_resolve_names_and_columns() {
        let descriptor = users()
            .field(FieldDescriptor::new("teamId", "i64"))
            .constraint(ConstraintDecl::unique(&["email"]))
            .constraint(ConstraintDecl::index(&["name", "email"]))
            .constraint(
                ConstraintDecl::foreign_key("teamId", "teams", "id")
                    .on_actions(ReferentialAction::Cascade, ReferentialAction::Restrict),
            );
        let schema = introspect(&descriptor).unwrap();

        assert_eq!(
            schema.indexes,
            vec![
                IndexSpec {
                    name: "uq_users_email".to_string(),
                    columns: vec!["email".to_string()],
                    unique: true,
                },
                IndexSpec {
                    name: "ix_users_name_email".to_string(),
                    columns: vec!["name".to_string(), "email".to_string()],
                    unique: false,
                },
            ]
        );
        assert_eq!(schema.foreign_keys[0].name, "fk_users_team_id");
        assert_eq!(schema.foreign_keys[0].column, "team_id");
        assert_eq!(schema.foreign_keys[0].on_delete, ReferentialAction::Cascade);
    }

    #[test]
    fn constraint_on_unknown_column_fails() {
        let descriptor = users().constraint(ConstraintDecl::unique(&["phone"]));
        let err = introspect(&descriptor).unwrap_err();
        assert!(err.to_string().contains("undeclared column `phone`"));
    }

    #[test]
    fn duplicate_constraint_names_fail() {
        let descriptor = users()
            .constraint(ConstraintDecl::unique(&["email"]))
            .constraint(ConstraintDecl::index(&["name"]).named("uq_users_email"));
        let err = introspect(&descriptor).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }
}
