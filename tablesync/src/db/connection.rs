//! Database connection handling
//!
//! This module provides functionality to establish and manage the MySQL
//! connection pool. The pool is opened once by the caller and handed to
//! every component explicitly.

use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// A MySQL connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: MySqlPool,
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::ConfigError("database.url is not set".to_string()));
        }

        let pool_size = config.pool_size.unwrap_or(DEFAULT_POOL_SIZE);
        let timeout_seconds = config.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| Error::ConnectionError(e.to_string()))?;

        tracing::info!(pool_size, timeout_seconds, "Connected to database");

        Ok(Self { pool })
    }

    /// Wrap an already configured pool
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Close every connection in the pool; in-flight statements are aborted
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open a connection pool from configuration
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    DatabaseConnection::connect(config).await
}
