use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub mod mysql;
pub mod records;

pub use records::{
    Direction, ErrorInfo, MigrationRunRecord, MigrationStepRecord, RunContext, RunStatus,
    StepOutcome,
};

pub const MIGRATION_RUNS_TABLE: &str = "migration_runs";
pub const MIGRATION_STEPS_TABLE: &str = "migration_steps";

/// Durable record of runs and their steps.
///
/// Writes are autocommit statements issued outside any migration's own
/// transaction, so they survive a migration that rolls back.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Creates the audit tables if absent.
    async fn ensure_schema(&self) -> Result<()>;

    async fn start_run(&self, run: &RunContext) -> Result<()>;

    async fn finish_run(
        &self,
        run: &RunContext,
        status: RunStatus,
        error: Option<&ErrorInfo>,
    ) -> Result<()>;

    /// Upserts the step to running, clearing error and verify fields of any earlier attempt.
    async fn start_step(&self, run: &RunContext, migration: &str) -> Result<()>;

    async fn finish_step(&self, run: &RunContext, migration: &str, outcome: &StepOutcome)
        -> Result<()>;

    async fn run(&self, run_id: Uuid) -> Result<Option<MigrationRunRecord>>;

    async fn steps(&self, run_id: Uuid) -> Result<Vec<MigrationStepRecord>>;
}
