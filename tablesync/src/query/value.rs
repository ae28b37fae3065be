//! Scalar values used for bind parameters and column defaults

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar SQL value.
///
/// Query values always travel as bind parameters. The only place a value is
/// rendered into SQL text is a column default inside DDL, where the dialect
/// does not accept placeholders; see [`SqlValue::to_sql_literal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Render as an escaped SQL literal
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => {
                let escaped = s.replace('\\', "\\\\").replace('\'', "''");
                format!("'{}'", escaped)
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert a JSON scalar; arrays and objects have no scalar form
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(SqlValue::Null),
            serde_json::Value::Bool(b) => Some(SqlValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(SqlValue::Int)
                .or_else(|| n.as_f64().map(SqlValue::Float)),
            serde_json::Value::String(s) => Some(SqlValue::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// Default for a column: a literal value or a raw SQL expression such as
/// `CURRENT_TIMESTAMP`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Literal(SqlValue),
    #[serde(skip_deserializing)]
    Expression(String),
}

impl DefaultValue {
    pub fn literal(value: impl Into<SqlValue>) -> Self {
        DefaultValue::Literal(value.into())
    }

    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Literal(value) => value.to_sql_literal(),
            DefaultValue::Expression(expr) => expr.clone(),
        }
    }

    /// Interpret a `column_default` string read from information_schema
    pub fn from_live(raw: &str, extra: &str) -> Self {
        let upper = raw.to_uppercase();
        if extra.to_lowercase().contains("default_generated")
            || upper.starts_with("CURRENT_TIMESTAMP")
            || upper == "NOW()"
        {
            return DefaultValue::Expression(raw.to_string());
        }
        if upper == "NULL" {
            return DefaultValue::Literal(SqlValue::Null);
        }
        if let Ok(n) = raw.parse::<i64>() {
            return DefaultValue::Literal(SqlValue::Int(n));
        }
        if let Ok(f) = raw.parse::<f64>() {
            return DefaultValue::Literal(SqlValue::Float(f));
        }
        let unquoted = raw
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap_or(raw);
        DefaultValue::Literal(SqlValue::Text(unquoted.to_string()))
    }
}

impl From<SqlValue> for DefaultValue {
    fn from(value: SqlValue) -> Self {
        DefaultValue::Literal(value)
    }
}
