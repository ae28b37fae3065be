//! Mapping between declared Rust field types and MySQL column types

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{CustomTypeMapping, TypeMappingConfig};
use crate::error::{Error, Result};

/// Splits a column type into base name, optional argument list and trailing
/// modifiers such as `unsigned`
static TYPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]+(?: precision| varying)?)\s*(?:\(\s*([^)]*?)\s*\))?\s*(.*)$")
        .expect("column type pattern is valid")
});

/// Longest VARCHAR that fits the row size limit with utf8mb4
const MAX_VARCHAR_LENGTH: u32 = 16383;
const MAX_MEDIUMTEXT_LENGTH: u32 = 4_194_303;

/// Optional size and precision hints declared on a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeHint {
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

/// Maps Rust types to column types and decides whether two column types
/// are the same once dialect synonyms are folded
#[derive(Debug, Clone)]
pub struct TypeMapper {
    default_string_length: u32,
    custom: Vec<CustomTypeMapping>,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new(&TypeMappingConfig::default())
    }
}

impl TypeMapper {
    pub fn new(config: &TypeMappingConfig) -> Self {
        Self {
            default_string_length: config.default_string_length,
            custom: config.custom.clone().unwrap_or_default(),
        }
    }

    /// Map a declared Rust type (with `Option` already stripped) to a
    /// column type
    pub fn to_column_type(&self, rust_type: &str, hint: &TypeHint) -> Result<String> {
        let cleaned = clean_rust_type(rust_type);
        let base = base_type_name(&cleaned);

        // Custom mappings win over the defaults
        for mapping in &self.custom {
            let custom = clean_rust_type(&mapping.rust_type);
            if custom == cleaned || custom == base {
                return Ok(mapping.db_type.clone());
            }
        }

        let column_type = match base.as_str() {
            "i8" => "TINYINT".to_string(),
            "i16" => "SMALLINT".to_string(),
            "i32" => "INT".to_string(),
            "i64" | "isize" => "BIGINT".to_string(),
            "u8" => "TINYINT UNSIGNED".to_string(),
            "u16" => "SMALLINT UNSIGNED".to_string(),
            "u32" => "INT UNSIGNED".to_string(),
            "u64" | "usize" => "BIGINT UNSIGNED".to_string(),
            "bool" => "TINYINT(1)".to_string(),
            "f32" | "f64" => match hint.precision {
                Some(precision) => format!("DECIMAL({},{})", precision, hint.scale.unwrap_or(2)),
                None if base == "f32" => "FLOAT".to_string(),
                None => "DOUBLE".to_string(),
            },
            "Decimal" | "BigDecimal" => format!(
                "DECIMAL({},{})",
                hint.precision.unwrap_or(20),
                hint.scale.unwrap_or(6)
            ),
            "String" | "str" | "Cow" => {
                let size = hint.size.unwrap_or(self.default_string_length);
                if size <= MAX_VARCHAR_LENGTH {
                    format!("VARCHAR({})", size)
                } else if size <= MAX_MEDIUMTEXT_LENGTH {
                    "MEDIUMTEXT".to_string()
                } else {
                    "LONGTEXT".to_string()
                }
            }
            "char" => "CHAR(1)".to_string(),
            "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime" => {
                "DATETIME".to_string()
            }
            "NaiveDate" | "Date" => "DATE".to_string(),
            "NaiveTime" | "Time" => "TIME".to_string(),
            "Uuid" => "CHAR(36)".to_string(),
            "Value" | "Json" => "JSON".to_string(),
            "Vec" if cleaned.ends_with("Vec<u8>") => "BLOB".to_string(),
            _ => {
                return Err(Error::TypeMappingError(format!(
                    "No mapping found for Rust type: {}",
                    rust_type
                )))
            }
        };

        Ok(column_type)
    }

    /// Whether a Rust type maps to an integer column
    pub fn is_integer_type(rust_type: &str) -> bool {
        matches!(
            base_type_name(&clean_rust_type(rust_type)).as_str(),
            "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize"
        )
    }

    /// Whether an existing column type already satisfies a target type.
    ///
    /// Both sides are normalized first, so `INT(11)` matches `INT`,
    /// `BOOLEAN` matches `TINYINT(1)` and `NUMERIC` matches `DECIMAL(10,0)`.
    pub fn is_compatible(&self, existing_sql_type: &str, target_sql_type: &str) -> bool {
        normalize(existing_sql_type) == normalize(target_sql_type)
    }
}

/// Canonical spelling of a column type
pub fn normalize(sql_type: &str) -> String {
    let collapsed = sql_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let Some(caps) = TYPE_PATTERN.captures(&collapsed) else {
        return collapsed;
    };

    let mut base = caps[1].to_string();
    let mut args = caps.get(2).map(|m| m.as_str().to_string());
    let rest = caps.get(3).map_or("", |m| m.as_str()).trim().to_string();

    base = match base.as_str() {
        "integer" => "int".to_string(),
        "numeric" | "dec" | "fixed" => "decimal".to_string(),
        "real" | "double precision" => "double".to_string(),
        "character varying" => "varchar".to_string(),
        // MariaDB stores JSON as LONGTEXT and reports it that way
        "json" => "longtext".to_string(),
        "bool" | "boolean" => {
            args = Some("1".to_string());
            "tinyint".to_string()
        }
        _ => base,
    };

    if base != "enum" && base != "set" {
        args = args.map(|a| a.split(',').map(str::trim).collect::<Vec<_>>().join(","));
    }

    match base.as_str() {
        // Display widths are cosmetic; tinyint(1) is how MySQL spells boolean
        "tinyint" => {
            if args.as_deref() != Some("1") {
                args = None;
            }
        }
        "smallint" | "mediumint" | "int" | "bigint" => args = None,
        "decimal" => {
            args = Some(match args {
                None => "10,0".to_string(),
                Some(a) if !a.contains(',') => format!("{},0", a),
                Some(a) => a,
            });
        }
        _ => {}
    }

    let mut normalized = base;
    if let Some(a) = args {
        normalized.push('(');
        normalized.push_str(&a);
        normalized.push(')');
    }
    if !rest.is_empty() {
        normalized.push(' ');
        normalized.push_str(&rest);
    }
    normalized
}

/// Remove whitespace and references from a stringified type
fn clean_rust_type(rust_type: &str) -> String {
    let compact: String = rust_type.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('&') && compact.ends_with("str") {
        return "str".to_string();
    }
    compact
}

/// Last path segment without generic arguments: `chrono::DateTime<Utc>` -> `DateTime`
fn base_type_name(cleaned: &str) -> String {
    let without_generics = cleaned.split('<').next().unwrap_or(cleaned);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}
