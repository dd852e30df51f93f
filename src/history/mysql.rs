use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Executor, MySqlPool};

use crate::history::{HistoryStore, MIGRATION_HISTORY_TABLE};

#[derive(Clone)]
pub struct MySqlHistoryStore {
    pool: MySqlPool,
}

impl MySqlHistoryStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlHistoryStore { pool }
    }
}

#[async_trait]
impl HistoryStore for MySqlHistoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS `{MIGRATION_HISTORY_TABLE}` (
                `name` VARCHAR(255) NOT NULL PRIMARY KEY,
                `applied_at` DATETIME(3) NOT NULL
            )"
        );

        self.pool
            .execute(query.as_str())
            .await
            .context("Failed to create migration history table")?;

        Ok(())
    }

    async fn applied(&self) -> Result<Vec<String>> {
        let query = format!("SELECT `name` FROM `{MIGRATION_HISTORY_TABLE}` ORDER BY `name`");

        let names: Vec<String> = sqlx::query_scalar(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read migration history")?;

        Ok(names)
    }

    async fn mark_applied(&self, name: &str) -> Result<()> {
        let query = format!(
            "INSERT IGNORE INTO `{MIGRATION_HISTORY_TABLE}` (`name`, `applied_at`) VALUES (?, ?)"
        );

        sqlx::query(&query)
            .bind(name.to_string())
            .bind(Utc::now().naive_utc())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to record {} as applied", name))?;

        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let query = format!("DELETE FROM `{MIGRATION_HISTORY_TABLE}` WHERE `name` = ?");

        sqlx::query(&query)
            .bind(name.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to remove {} from history", name))?;

        Ok(())
    }
}
