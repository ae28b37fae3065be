//! Query directives: filters, sort order and pagination
//!
//! A [`QuerySpec`] is built per request from untrusted input and thrown
//! away after the query runs. Field names and operator keywords are kept
//! as given; the query builder whitelists them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::query::condition::Operator;
use crate::query::value::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(direction: &str) -> Option<Self> {
        if direction.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if direction.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }
}

/// Value shape of a filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    None,
    Single(SqlValue),
    Range(SqlValue, SqlValue),
}

impl FilterValue {
    /// Number of values carried
    pub fn len(&self) -> usize {
        match self {
            FilterValue::None => 0,
            FilterValue::Single(_) => 1,
            FilterValue::Range(_, _) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    /// Untrusted operator keyword
    pub operator: String,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(field: &str, operator: &str, value: FilterValue) -> Self {
        Self {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub filters: Vec<FilterCondition>,
    pub sort: Vec<(String, SortDirection)>,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    pub count_only: bool,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            page: 1,
            page_size: 10,
            count_only: false,
        }
    }
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, operator: &str, value: FilterValue) -> Self {
        self.filters.push(FilterCondition::new(field, operator, value));
        self
    }

    pub fn sort_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort.push((field.to_string(), direction));
        self
    }

    /// Zero is treated as the first page
    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn count_only(mut self, count_only: bool) -> Self {
        self.count_only = count_only;
        self
    }

    /// Rows skipped before the current page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size.max(1))
    }

    /// Build a spec from a request-shaped JSON object:
    ///
    /// ```json
    /// {"filter": {"name": {"like": "ann"}, "email": "x"},
    ///  "sort": {"id": "desc"}, "page": 2, "page_size": 20, "count": true}
    /// ```
    ///
    /// A bare filter value means `eq` (`null` means the `null` operator),
    /// a two-element array is a range. Invalid page numbers fall back to
    /// the defaults and the page size is capped at `max_page_size`. Sort
    /// entries with a direction other than asc/desc are dropped.
    pub fn from_params(params: &Value, config: &QueryConfig) -> Result<Self> {
        let Value::Object(params) = params else {
            return Err(Error::ValidationError(
                "Query parameters must be an object".to_string(),
            ));
        };

        let mut spec = QuerySpec {
            page_size: config.default_page_size.max(1),
            ..QuerySpec::default()
        };

        if let Some(filter) = params.get("filter") {
            let Value::Object(filter) = filter else {
                return Err(Error::ValidationError("`filter` must be an object".to_string()));
            };
            for (field, condition) in filter {
                match condition {
                    Value::Object(by_operator) => {
                        for (operator, value) in by_operator {
                            let value = filter_value(field, operator, value)?;
                            spec.filters.push(FilterCondition::new(field, operator, value));
                        }
                    }
                    Value::Null => {
                        spec.filters
                            .push(FilterCondition::new(field, "null", FilterValue::None));
                    }
                    scalar => {
                        let value = filter_value(field, "eq", scalar)?;
                        spec.filters.push(FilterCondition::new(field, "eq", value));
                    }
                }
            }
        }

        if let Some(Value::Object(sort)) = params.get("sort") {
            for (field, direction) in sort {
                match direction.as_str().and_then(SortDirection::parse) {
                    Some(direction) => spec.sort.push((field.clone(), direction)),
                    None => tracing::debug!(field = %field, "Dropping sort entry with invalid direction"),
                }
            }
        }

        if let Some(page) = params.get("page").and_then(positive_number) {
            spec.page = page;
        }
        if let Some(page_size) = params.get("page_size").and_then(positive_number) {
            spec.page_size = page_size;
        }
        spec.page_size = spec.page_size.min(config.max_page_size.max(1));

        spec.count_only = params.get("count").is_some_and(truthy);

        Ok(spec)
    }
}

fn filter_value(field: &str, operator: &str, value: &Value) -> Result<FilterValue> {
    // Operators without values ignore whatever flag the request carried
    if Operator::from_keyword(operator).is_some_and(|op| op.arity() == 0) {
        return Ok(FilterValue::None);
    }

    match value {
        Value::Null => Ok(FilterValue::None),
        Value::Array(items) => match items.as_slice() {
            [low, high] => match (SqlValue::from_json(low), SqlValue::from_json(high)) {
                (Some(low), Some(high)) => Ok(FilterValue::Range(low, high)),
                _ => Err(invalid_value(field, operator)),
            },
            _ => Err(invalid_value(field, operator)),
        },
        scalar => SqlValue::from_json(scalar)
            .map(FilterValue::Single)
            .ok_or_else(|| invalid_value(field, operator)),
    }
}

fn invalid_value(field: &str, operator: &str) -> Error {
    Error::ValidationError(format!(
        "Filter `{}` `{}` has a value of unsupported shape",
        field, operator
    ))
}

/// A number or numeric string above zero
fn positive_number(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(n).ok().filter(|n| *n > 0)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}
