//! Configuration handling for tablesync

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{Error, Result};
use crate::query::value::DefaultValue;
use crate::schema::diff::DiffPolicy;

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete tablesync configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub naming: NamingConfig,
    pub type_mapping: TypeMappingConfig,
    pub query: QueryConfig,
    pub logging: Option<LoggingConfig>,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mysql://root@localhost:3306/app".to_string(),
            pool_size: None,
            timeout_seconds: None,
        }
    }
}

/// Migration policy, the file-based equivalent of the migrate command flags
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Drop live columns that the model no longer declares
    pub allow_column_removal: bool,
    /// Tighten NULL columns to NOT NULL when the model says so
    pub enforce_not_null: bool,
    /// Default given to NOT NULL columns added to existing tables
    pub default_for_new_not_null_columns: Option<DefaultValue>,
    /// Drop indexes and foreign keys the model no longer declares
    pub sync_schema: bool,
    pub dry_run: bool,
    pub history_table: Option<String>,
}

impl MigrationsConfig {
    pub fn policy(&self) -> DiffPolicy {
        DiffPolicy {
            allow_column_removal: self.allow_column_removal,
            enforce_not_null: self.enforce_not_null,
            default_for_new_not_null_columns: self.default_for_new_not_null_columns.clone(),
        }
    }
}

/// Naming conventions configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NamingConfig {
    pub table_style: String,
    pub column_style: String,
    pub pluralize_tables: bool,
    pub index_pattern: String,
    pub unique_pattern: String,
    pub foreign_key_pattern: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            table_style: "snake_case".to_string(),
            column_style: "snake_case".to_string(),
            pluralize_tables: true,
            index_pattern: "ix_{table}_{columns}".to_string(),
            unique_pattern: "uq_{table}_{columns}".to_string(),
            foreign_key_pattern: "fk_{table}_{column}".to_string(),
        }
    }
}

/// Type mapping configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TypeMappingConfig {
    pub default_string_length: u32,
    pub custom: Option<Vec<CustomTypeMapping>>,
}

impl Default for TypeMappingConfig {
    fn default() -> Self {
        Self {
            default_string_length: 255,
            custom: None,
        }
    }
}

/// Custom type mapping
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomTypeMapping {
    pub rust_type: String,
    pub db_type: String,
}

/// Pagination limits applied to incoming query requests
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            stdout: true,
        }
    }
}
