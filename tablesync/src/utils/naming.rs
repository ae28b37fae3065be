//! Naming utilities for tablesync
//!
//! Name conventions for tables, columns and constraints, plus MySQL
//! identifier quoting.

use inflector::Inflector;

/// MySQL limit on identifier length
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Apply a naming convention to a string
pub fn apply_naming_convention(name: &str, convention: &str) -> String {
    match convention {
        "snake_case" => name.to_snake_case(),
        "camel_case" => name.to_camel_case(),
        "pascal_case" => name.to_pascal_case(),
        "screaming_snake_case" => name.to_screaming_snake_case(),
        _ => name.to_string(), // Default: keep as is
    }
}

/// Format a name according to a pattern with placeholders
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = pattern.to_string();

    for (placeholder, value) in replacements {
        result = result.replace(&format!("{{{}}}", placeholder), value);
    }

    result
}

/// Get table name from a model name according to convention
pub fn get_table_name(model_name: &str, style: &str, pluralize: bool) -> String {
    let name = apply_naming_convention(model_name, style);

    if pluralize {
        // Irregular plurals the inflector gets wrong
        match name.to_lowercase().as_str() {
            "person" => "people".to_string(),
            "child" => "children".to_string(),
            "man" => "men".to_string(),
            "woman" => "women".to_string(),
            "mouse" => "mice".to_string(),
            _ => name.to_plural(),
        }
    } else {
        name
    }
}

/// Get column name from a field name according to convention
pub fn get_column_name(field_name: &str, style: &str) -> String {
    apply_naming_convention(field_name, style)
}

/// Get index or unique constraint name from table and columns according to pattern
pub fn get_index_name(pattern: &str, table_name: &str, columns: &[String]) -> String {
    let columns_str = columns.join("_");

    truncate_identifier(
        &format_name(pattern, &[("table", table_name), ("columns", &columns_str)]),
        MAX_IDENTIFIER_LENGTH,
    )
}

/// Get foreign key constraint name according to pattern
pub fn get_foreign_key_name(pattern: &str, table_name: &str, column_name: &str) -> String {
    truncate_identifier(
        &format_name(pattern, &[("table", table_name), ("column", column_name)]),
        MAX_IDENTIFIER_LENGTH,
    )
}

/// Truncate an identifier to fit database limits.
///
/// Long names keep a prefix and gain the first 8 hex digits of the md5 of
/// the full name, so two long names sharing a prefix stay distinct.
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length {
        return name.to_string();
    }

    let hash = format!("{:x}", md5::compute(name.as_bytes()));
    let mut keep_length = max_length.saturating_sub(9);
    while !name.is_char_boundary(keep_length) {
        keep_length -= 1;
    }

    format!("{}_{}", &name[..keep_length], &hash[0..8])
}

/// Quote a MySQL identifier with backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote and join a list of identifiers
pub fn quote_identifiers(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Find the first pair of names that collide when compared case-insensitively
pub fn check_identifier_conflicts(names: &[String]) -> Option<(String, String)> {
    let mut seen = std::collections::HashMap::<String, &String>::new();

    for name in names {
        if let Some(existing) = seen.insert(name.to_lowercase(), name) {
            return Some((existing.clone(), name.clone()));
        }
    }

    None
}
