use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{Executor, MySqlPool, Row};
use uuid::Uuid;

use crate::audit::{
    AuditStore, Direction, ErrorInfo, MigrationRunRecord, MigrationStepRecord, RunContext,
    RunStatus, StepOutcome, MIGRATION_RUNS_TABLE, MIGRATION_STEPS_TABLE,
};
use crate::verify::VerifyStatus;

#[derive(Clone)]
pub struct MySqlAuditStore {
    pool: MySqlPool,
}

impl MySqlAuditStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlAuditStore { pool }
    }
}

#[async_trait]
impl AuditStore for MySqlAuditStore {
    async fn ensure_schema(&self) -> Result<()> {
        let runs = format!(
            "CREATE TABLE IF NOT EXISTS `{MIGRATION_RUNS_TABLE}` (
                `id` BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                `run_id` CHAR(36) NOT NULL,
                `direction` VARCHAR(8) NOT NULL,
                `status` VARCHAR(16) NOT NULL,
                `started_at` DATETIME(3) NOT NULL,
                `finished_at` DATETIME(3) NULL,
                `environment` VARCHAR(64) NULL,
                `database_name` VARCHAR(128) NULL,
                `error_message` TEXT NULL,
                `error_stack` MEDIUMTEXT NULL,
                INDEX `idx_{MIGRATION_RUNS_TABLE}_run_id` (`run_id`)
            )"
        );

        let steps = format!(
            "CREATE TABLE IF NOT EXISTS `{MIGRATION_STEPS_TABLE}` (
                `id` BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                `run_id` CHAR(36) NOT NULL,
                `direction` VARCHAR(8) NOT NULL,
                `migration_name` VARCHAR(255) NOT NULL,
                `status` VARCHAR(16) NOT NULL,
                `started_at` DATETIME(3) NOT NULL,
                `finished_at` DATETIME(3) NULL,
                `error_message` TEXT NULL,
                `error_stack` MEDIUMTEXT NULL,
                `verify_status` VARCHAR(16) NULL,
                `verify_details` JSON NULL,
                UNIQUE KEY `uq_{MIGRATION_STEPS_TABLE}_run_migration` (`run_id`, `migration_name`, `direction`),
                INDEX `idx_{MIGRATION_STEPS_TABLE}_run_id` (`run_id`)
            )"
        );

        self.pool
            .execute(runs.as_str())
            .await
            .context("Failed to create migration runs table")?;
        self.pool
            .execute(steps.as_str())
            .await
            .context("Failed to create migration steps table")?;

        Ok(())
    }

    async fn start_run(&self, run: &RunContext) -> Result<()> {
        let query = format!(
            "INSERT INTO `{MIGRATION_RUNS_TABLE}` \
             (`run_id`, `direction`, `status`, `started_at`, `environment`, `database_name`) \
             VALUES (?, ?, ?, ?, ?, ?)"
        );

        sqlx::query(&query)
            .bind(run.run_id.to_string())
            .bind(run.direction.as_str())
            .bind(RunStatus::Running.as_str())
            .bind(Utc::now().naive_utc())
            .bind(run.environment.clone())
            .bind(run.database.clone())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to record start of run {}", run.run_id))?;

        Ok(())
    }

    async fn finish_run(
        &self,
        run: &RunContext,
        status: RunStatus,
        error: Option<&ErrorInfo>,
    ) -> Result<()> {
        let query = format!(
            "UPDATE `{MIGRATION_RUNS_TABLE}` \
             SET `status` = ?, `finished_at` = ?, `error_message` = ?, `error_stack` = ? \
             WHERE `run_id` = ?"
        );

        sqlx::query(&query)
            .bind(status.as_str())
            .bind(Utc::now().naive_utc())
            .bind(error.map(|e| e.message.clone()))
            .bind(error.map(|e| e.stack.clone()))
            .bind(run.run_id.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to record end of run {}", run.run_id))?;

        Ok(())
    }

    async fn start_step(&self, run: &RunContext, migration: &str) -> Result<()> {
        let query = format!(
            "INSERT INTO `{MIGRATION_STEPS_TABLE}` \
             (`run_id`, `direction`, `migration_name`, `status`, `started_at`) \
             VALUES (?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE `status` = VALUES(`status`), `started_at` = VALUES(`started_at`), \
             `finished_at` = NULL, `error_message` = NULL, `error_stack` = NULL, \
             `verify_status` = NULL, `verify_details` = NULL"
        );

        sqlx::query(&query)
            .bind(run.run_id.to_string())
            .bind(run.direction.as_str())
            .bind(migration.to_string())
            .bind(RunStatus::Running.as_str())
            .bind(Utc::now().naive_utc())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to record start of step {}", migration))?;

        Ok(())
    }

    async fn finish_step(
        &self,
        run: &RunContext,
        migration: &str,
        outcome: &StepOutcome,
    ) -> Result<()> {
        let query = format!(
            "UPDATE `{MIGRATION_STEPS_TABLE}` \
             SET `status` = ?, `finished_at` = ?, `error_message` = ?, `error_stack` = ?, \
             `verify_status` = ?, `verify_details` = ? \
             WHERE `run_id` = ? AND `migration_name` = ? AND `direction` = ?"
        );

        let details = serde_json::to_string(&outcome.verify.details)?;

        sqlx::query(&query)
            .bind(outcome.status.as_str())
            .bind(Utc::now().naive_utc())
            .bind(outcome.error.as_ref().map(|e| e.message.clone()))
            .bind(outcome.error.as_ref().map(|e| e.stack.clone()))
            .bind(outcome.verify.status.as_str())
            .bind(details)
            .bind(run.run_id.to_string())
            .bind(migration.to_string())
            .bind(run.direction.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to record end of step {}", migration))?;

        Ok(())
    }

    async fn run(&self, run_id: Uuid) -> Result<Option<MigrationRunRecord>> {
        let query = format!(
            "SELECT `run_id`, `direction`, `status`, `started_at`, `finished_at`, `environment`, \
             `database_name`, `error_message`, `error_stack` \
             FROM `{MIGRATION_RUNS_TABLE}` WHERE `run_id` = ?"
        );

        let row = sqlx::query(&query)
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read run {}", run_id))?;

        row.map(|row| run_from_row(&row)).transpose()
    }

    async fn steps(&self, run_id: Uuid) -> Result<Vec<MigrationStepRecord>> {
        let query = format!(
            "SELECT `run_id`, `direction`, `migration_name`, `status`, `started_at`, `finished_at`, \
             `error_message`, `error_stack`, `verify_status`, \
             CAST(`verify_details` AS CHAR) AS `verify_details` \
             FROM `{MIGRATION_STEPS_TABLE}` WHERE `run_id` = ? ORDER BY `id`"
        );

        let rows = sqlx::query(&query)
            .bind(run_id.to_string())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read steps of run {}", run_id))?;

        rows.iter().map(step_from_row).collect()
    }
}

fn run_from_row(row: &MySqlRow) -> Result<MigrationRunRecord> {
    Ok(MigrationRunRecord {
        run_id: parse_uuid(row.try_get("run_id")?)?,
        direction: parse_direction(row.try_get("direction")?)?,
        status: parse_status(row.try_get("status")?)?,
        started_at: to_utc(row.try_get("started_at")?),
        finished_at: row.try_get::<Option<NaiveDateTime>, _>("finished_at")?.map(to_utc),
        environment: row.try_get::<Option<String>, _>("environment")?.unwrap_or_default(),
        database: row.try_get::<Option<String>, _>("database_name")?.unwrap_or_default(),
        error_message: row.try_get("error_message")?,
        error_stack: row.try_get("error_stack")?,
    })
}

fn step_from_row(row: &MySqlRow) -> Result<MigrationStepRecord> {
    let verify_status: Option<String> = row.try_get("verify_status")?;
    let verify_details: Option<String> = row.try_get("verify_details")?;

    Ok(MigrationStepRecord {
        run_id: parse_uuid(row.try_get("run_id")?)?,
        direction: parse_direction(row.try_get("direction")?)?,
        migration: row.try_get("migration_name")?,
        status: parse_status(row.try_get("status")?)?,
        started_at: to_utc(row.try_get("started_at")?),
        finished_at: row.try_get::<Option<NaiveDateTime>, _>("finished_at")?.map(to_utc),
        error_message: row.try_get("error_message")?,
        error_stack: row.try_get("error_stack")?,
        verify_status: verify_status.as_deref().and_then(VerifyStatus::parse),
        verify_details: verify_details
            .map(|details| serde_json::from_str(&details))
            .transpose()?,
    })
}

fn parse_uuid(value: String) -> Result<Uuid> {
    Uuid::parse_str(&value).with_context(|| format!("Invalid run id {}", value))
}

fn parse_direction(value: String) -> Result<Direction> {
    Direction::parse(&value).ok_or_else(|| anyhow!("Invalid direction {}", value))
}

fn parse_status(value: String) -> Result<RunStatus> {
    RunStatus::parse(&value).ok_or_else(|| anyhow!("Invalid status {}", value))
}

fn to_utc(value: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&value)
}
