//! Parameterized query building from untrusted filter, sort and page input
//!
//! Field names are whitelisted against the descriptor's declared fields and
//! values only ever travel as bind parameters. The generated SQL text holds
//! quoted identifiers, whitelisted operator fragments, placeholders and the
//! typed LIMIT/OFFSET integers.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::NamingConfig;
use crate::error::{Error, Result};
use crate::models::model::TableDescriptor;
use crate::query::condition::{ConditionTranslator, SqlOperatorFragment};
use crate::query::spec::{FilterCondition, FilterValue, QuerySpec};
use crate::query::value::SqlValue;
use crate::utils::naming::quote_identifier;

/// Backtick-quoted identifiers are skipped; `:name` outside them is a placeholder
static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`(?:[^`]|``)*`|:([A-Za-z_][A-Za-z0-9_]*)")
        .expect("placeholder pattern is valid")
});

/// SQL with named placeholders and their values
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    /// Placeholder name (without the colon) to bound value, in SQL order
    pub params: IndexMap<String, SqlValue>,
}

impl BuiltQuery {
    /// Rewrite `:name` placeholders to `?` and list the values in order
    pub fn to_positional(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::with_capacity(self.sql.len());
        let mut values = Vec::with_capacity(self.params.len());
        let mut last = 0;

        for caps in PLACEHOLDER_PATTERN.captures_iter(&self.sql) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some(value) = self.params.get(name.as_str()) else {
                continue;
            };
            sql.push_str(&self.sql[last..whole.start()]);
            sql.push('?');
            values.push(value.clone());
            last = whole.end();
        }
        sql.push_str(&self.sql[last..]);

        (sql, values)
    }
}

/// Composes WHERE / ORDER BY / LIMIT fragments and full SELECTs
pub struct QueryBuilder<'a> {
    naming: &'a NamingConfig,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(naming: &'a NamingConfig) -> Self {
        Self { naming }
    }

    /// Build the `WHERE ... ORDER BY ... LIMIT ... OFFSET ...` fragment.
    ///
    /// Conditions and sort entries on undeclared fields are dropped. An
    /// operator outside the whitelist fails the whole build, as does a
    /// value whose shape does not fit its operator.
    pub fn build(&self, descriptor: &TableDescriptor, spec: &QuerySpec) -> Result<BuiltQuery> {
        let mut params: IndexMap<String, SqlValue> = IndexMap::new();
        let mut conditions = Vec::new();

        for filter in &spec.filters {
            let Some(column) = self.whitelisted_column(descriptor, &filter.field) else {
                tracing::debug!(field = %filter.field, "Dropping filter on undeclared field");
                continue;
            };
            // Only a whitelisted field gets as far as operator translation
            let fragment = ConditionTranslator::translate(&filter.operator)?;
            conditions.push(self.condition_sql(&column, filter, &fragment, &mut params)?);
        }

        let mut sorts = Vec::new();
        for (field, direction) in &spec.sort {
            match self.whitelisted_column(descriptor, field) {
                Some(column) => sorts.push(format!(
                    "{} {}",
                    quote_identifier(&column),
                    direction.as_sql()
                )),
                None => tracing::debug!(field = %field, "Dropping sort on undeclared field"),
            }
        }

        let mut parts = Vec::new();
        if !conditions.is_empty() {
            parts.push(format!("WHERE {}", conditions.join(" AND ")));
        }
        // A count never needs ordering or paging
        if !spec.count_only {
            if !sorts.is_empty() {
                parts.push(format!("ORDER BY {}", sorts.join(", ")));
            }
            parts.push(format!(
                "LIMIT {} OFFSET {}",
                spec.page_size.max(1),
                spec.offset()
            ));
        }

        Ok(BuiltQuery {
            sql: parts.join(" "),
            params,
        })
    }

    /// Full statement: the declared columns, or `COUNT(*) AS total` for a
    /// count-only spec, followed by the built fragment
    pub fn select(&self, descriptor: &TableDescriptor, spec: &QuerySpec) -> Result<BuiltQuery> {
        let fragment = self.build(descriptor, spec)?;
        let table = quote_identifier(&descriptor.resolved_table_name(self.naming));

        let projection = if spec.count_only {
            "COUNT(*) AS total".to_string()
        } else {
            descriptor
                .column_names(&self.naming.column_style)
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, table);
        if !fragment.sql.is_empty() {
            sql.push(' ');
            sql.push_str(&fragment.sql);
        }

        Ok(BuiltQuery {
            sql,
            params: fragment.params,
        })
    }

    /// Column for a declared field, matched by field or column name
    fn whitelisted_column(&self, descriptor: &TableDescriptor, field: &str) -> Option<String> {
        descriptor.fields.iter().find_map(|f| {
            let column = f.column_name(&self.naming.column_style);
            (f.name == field || column == field).then_some(column)
        })
    }

    fn condition_sql(
        &self,
        column: &str,
        filter: &FilterCondition,
        fragment: &SqlOperatorFragment,
        params: &mut IndexMap<String, SqlValue>,
    ) -> Result<String> {
        let values: Vec<SqlValue> = match (&filter.value, fragment.arity()) {
            (FilterValue::None, 0) => Vec::new(),
            (FilterValue::Single(v), 1) => vec![v.clone()],
            (FilterValue::Range(low, high), 2) => vec![low.clone(), high.clone()],
            (value, arity) => {
                return Err(Error::ValidationError(format!(
                    "Operator `{}` on `{}` takes {} value(s), got {}",
                    fragment.operator,
                    filter.field,
                    arity,
                    value.len()
                )))
            }
        };

        let base = bind_base(column, fragment, params);
        let names: Vec<String> = fragment
            .bind_suffixes()
            .iter()
            .map(|suffix| format!("{}{}", base, suffix))
            .collect();

        for (name, value) in names.iter().zip(values) {
            let value = if fragment.operator.is_pattern() {
                if value.is_null() {
                    return Err(Error::ValidationError(format!(
                        "Operator `{}` on `{}` needs a non-null value",
                        fragment.operator, filter.field
                    )));
                }
                SqlValue::Text(format!("%{}%", value))
            } else {
                value
            };
            params.insert(name.clone(), value);
        }

        Ok(fragment.render(&quote_identifier(column), &names))
    }
}

/// `{column}_{keyword}`, with `_2`, `_3`, ... appended until no derived
/// name is taken. A column starting with a digit gets a leading `_`.
fn bind_base(
    column: &str,
    fragment: &SqlOperatorFragment,
    params: &IndexMap<String, SqlValue>,
) -> String {
    let mut sanitized: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !sanitized.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        sanitized.insert(0, '_');
    }
    let base = format!("{}_{}", sanitized, fragment.operator.keyword());

    let taken = |candidate: &str| {
        fragment
            .bind_suffixes()
            .iter()
            .any(|suffix| params.contains_key(&format!("{}{}", candidate, suffix)))
    };

    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
