use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::ConnectOptions;

use crate::config::DatabaseConfig;

/// Owns the pool every store and mutator shares.
pub struct SqlxMySqlConnection {
    pub pool: MySqlPool,
}

#[async_trait]
pub trait DatabaseConnection: Sized {
    async fn new(config: &DatabaseConfig, max_connections: u32) -> Result<Self>;

    /// Waits for in-flight queries, then closes every connection.
    async fn close(self);
}

#[async_trait]
impl DatabaseConnection for SqlxMySqlConnection {
    async fn new(config: &DatabaseConfig, max_connections: u32) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database)
            .disable_statement_logging()
            .clone();

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to MySQL server at {}:{}",
                    config.host, config.port
                )
            })?;

        Ok(SqlxMySqlConnection { pool })
    }

    async fn close(self) {
        self.pool.close().await;
    }
}
