//! Operator whitelist for filter conditions
//!
//! Each keyword maps to a fixed SQL fragment and a fixed number of bind
//! values. Anything outside the list is rejected; there is no fallback to
//! equality.

use std::fmt;

use crate::error::{Error, Result};

/// A whitelisted comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Bigger,
    Less,
    BiggerEq,
    LessEq,
    Not,
    Null,
    NotNull,
    Like,
    NotLike,
    Between,
    NotBetween,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Bigger,
        Operator::Less,
        Operator::BiggerEq,
        Operator::LessEq,
        Operator::Not,
        Operator::Null,
        Operator::NotNull,
        Operator::Like,
        Operator::NotLike,
        Operator::Between,
        Operator::NotBetween,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Bigger => "bigger",
            Operator::Less => "less",
            Operator::BiggerEq => "bigger_eq",
            Operator::LessEq => "less_eq",
            Operator::Not => "not",
            Operator::Null => "null",
            Operator::NotNull => "notnull",
            Operator::Like => "like",
            Operator::NotLike => "notlike",
            Operator::Between => "between",
            Operator::NotBetween => "notbetween",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Bigger => ">",
            Operator::Less => "<",
            Operator::BiggerEq => ">=",
            Operator::LessEq => "<=",
            Operator::Not => "<>",
            Operator::Null => "IS NULL",
            Operator::NotNull => "IS NOT NULL",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
        }
    }

    /// Number of bind values the operator takes
    pub fn arity(&self) -> usize {
        match self {
            Operator::Null | Operator::NotNull => 0,
            Operator::Between | Operator::NotBetween => 2,
            _ => 1,
        }
    }

    /// LIKE-family operators get their value wrapped in wildcards
    pub fn is_pattern(&self) -> bool {
        matches!(self, Operator::Like | Operator::NotLike)
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.keyword().eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The SQL side of one operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlOperatorFragment {
    pub operator: Operator,
}

impl SqlOperatorFragment {
    pub fn arity(&self) -> usize {
        self.operator.arity()
    }

    /// Suffixes for the bind names, one per value
    pub fn bind_suffixes(&self) -> &'static [&'static str] {
        match self.arity() {
            0 => &[],
            1 => &[""],
            _ => &["_low", "_high"],
        }
    }

    /// Render `column OP :name`; `bind_names` must hold `arity()` names
    /// without the leading colon
    pub fn render(&self, column: &str, bind_names: &[String]) -> String {
        let op = self.operator.sql();
        match bind_names {
            [] => format!("{} {}", column, op),
            [low, high, ..] => format!("{} {} :{} AND :{}", column, op, low, high),
            [name] => format!("{} {} :{}", column, op, name),
        }
    }
}

/// Maps operator keywords to SQL fragments
pub struct ConditionTranslator;

impl ConditionTranslator {
    /// Translate an untrusted keyword, ASCII case-insensitively
    pub fn translate(keyword: &str) -> Result<SqlOperatorFragment> {
        Operator::from_keyword(keyword)
            .map(|operator| SqlOperatorFragment { operator })
            .ok_or_else(|| Error::UnsupportedOperatorError(keyword.to_string()))
    }
}
