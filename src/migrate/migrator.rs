use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Context, Error, Result};
use log::Level;
use tokio::time::Instant;
use uuid::Uuid;

use crate::audit::{AuditStore, Direction, ErrorInfo, RunContext, RunStatus, StepOutcome};
use crate::common::helpers::print_error_chain;
use crate::history::baseline::{BaselineBootstrapper, BaselineOutcome};
use crate::history::HistoryStore;
use crate::migrate::migration::Migration;
use crate::migrate::migration_options::MigrationOptions;
use crate::migrate::migration_result::MigrationResult;
use crate::mutate::SchemaMutator;
use crate::track::TrackingSchemaMutator;
use crate::verify::{combine, SchemaVerifier, VerifyStatus, VerifySummary};

/// Drives discovery, ordering, audit lifecycle and fail-fast control flow.
pub struct MigrationOrchestrator {
    mutator: Arc<dyn SchemaMutator>,
    audit: Arc<dyn AuditStore>,
    history: Arc<dyn HistoryStore>,
    migrations: Vec<Box<dyn Migration>>,
    verifier: SchemaVerifier,
    options: MigrationOptions,
}

impl MigrationOrchestrator {
    pub fn new(
        mutator: Arc<dyn SchemaMutator>,
        audit: Arc<dyn AuditStore>,
        history: Arc<dyn HistoryStore>,
        migrations: Vec<Box<dyn Migration>>,
        options: MigrationOptions,
    ) -> Self {
        MigrationOrchestrator {
            mutator,
            audit,
            history,
            migrations,
            verifier: SchemaVerifier::new(options.strict_verify),
            options,
        }
    }

    /// `Up` applies every pending migration; `Down` reverts the most recently applied one.
    pub async fn run(&self, direction: Direction) -> Result<MigrationResult> {
        let start_time = Instant::now();

        self.audit
            .ensure_schema()
            .await
            .context("Failed to prepare audit tables")?;
        self.history
            .ensure_schema()
            .await
            .context("Failed to prepare migration history table")?;

        let run = RunContext::new(
            direction,
            &self.options.environment,
            &self.options.database,
        );

        self.audit.start_run(&run).await?;

        info!(
            "Starting {} run {} on {} ({})",
            direction, run.run_id, run.database, run.environment
        );

        let result = match direction {
            Direction::Up => self.run_up(&run).await,
            Direction::Down => self.run_down(&run).await,
        };

        // The run row is finished exactly once, whatever happened above
        let (status, error) = match &result {
            Ok(_) => (RunStatus::Success, None),
            Err(err) => (RunStatus::Failed, Some(ErrorInfo::from(err))),
        };
        let finished = self.audit.finish_run(&run, status, error.as_ref()).await;

        let elapsed = Instant::now()
            .saturating_duration_since(start_time)
            .as_secs_f32();

        match self.report(run.run_id).await {
            Ok(lines) => lines.iter().for_each(|line| info!("{}", line)),
            Err(err) => warn!("Could not read back run {}: {:#}", run.run_id, err),
        }

        match (result, finished) {
            (Ok(result), Ok(())) => {
                if let Some(BaselineOutcome::Baselined { marked, excluded }) = &result.baseline {
                    info!(
                        "Baseline recorded {} migrations as applied, {} left to run",
                        marked.len(),
                        excluded.len()
                    );
                }
                info!(
                    "Run {} ({}) finished, migrations executed: {}, with warnings: {}, took: {}s",
                    run.run_id,
                    result.direction,
                    result.executed.len(),
                    result.warned.len(),
                    elapsed
                );
                Ok(result)
            }
            (Ok(_), Err(err)) => Err(err.context("Failed to finish run audit")),
            (Err(err), finished) => {
                if let Err(finish_err) = finished {
                    print_error_chain(&finish_err.context("Failed to finish run audit"));
                }
                error!("Run {} failed after {}s", run.run_id, elapsed);
                Err(err)
            }
        }
    }

    /// Reads a run and its steps back from the audit store as printable lines.
    pub async fn report(&self, run_id: Uuid) -> Result<Vec<String>> {
        let run = self
            .audit
            .run(run_id)
            .await?
            .ok_or_else(|| anyhow!("Run {} is not in the audit log", run_id))?;
        let steps = self.audit.steps(run_id).await?;
        let verbose = log_enabled!(Level::Debug);

        let mut lines = vec![run.summary()];
        for step in steps.iter().filter(|step| step.run_id == run.run_id) {
            lines.push(step.summary());
            if let Some(message) = &step.error_message {
                lines.push(format!("    error: {}", message));
            }
            if !verbose {
                continue;
            }
            if let Some(stack) = &step.error_stack {
                lines.extend(stack.lines().map(|line| format!("    {}", line)));
            }
            if let Some(details) = &step.verify_details {
                lines.push(format!("    verify details: {}", details));
            }
        }

        if let Some(message) = &run.error_message {
            lines.push(format!("  run error: {}", message));
        }
        if let (true, Some(stack)) = (verbose, &run.error_stack) {
            lines.extend(stack.lines().map(|line| format!("    {}", line)));
        }

        Ok(lines)
    }

    /// Names of registered migrations not yet in history, in execution order.
    pub async fn pending(&self) -> Result<Vec<String>> {
        self.history
            .ensure_schema()
            .await
            .context("Failed to prepare migration history table")?;

        let applied: HashSet<String> = self.history.applied().await?.into_iter().collect();

        Ok(self
            .pending_migrations(&applied)
            .into_iter()
            .map(|m| m.name().to_string())
            .collect())
    }

    fn migration_names(&self) -> Vec<String> {
        self.migrations.iter().map(|m| m.name().to_string()).collect()
    }

    fn pending_migrations(&self, applied: &HashSet<String>) -> Vec<&dyn Migration> {
        self.migrations
            .iter()
            .map(|m| &**m)
            .filter(|m| !applied.contains(m.name()))
            .collect()
    }

    async fn run_up(&self, run: &RunContext) -> Result<MigrationResult> {
        let mut result = MigrationResult::new(run.run_id, run.direction);

        let baseline = BaselineBootstrapper::new(
            &*self.mutator,
            &*self.history,
            &self.options.baseline_exclusions,
        )
        .bootstrap(&self.migration_names())
        .await
        .context("Baseline bootstrap failed")?;
        result.baseline = Some(baseline);

        let applied: HashSet<String> = self.history.applied().await?.into_iter().collect();
        let pending = self.pending_migrations(&applied);

        if pending.is_empty() {
            info!("Database is up to date, {} migrations applied", applied.len());
            return Ok(result);
        }

        info!(
            "Migrations already applied: {}, pending: {}",
            applied.len(),
            pending
                .iter()
                .map(|m| m.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for migration in pending {
            let verify = self.run_up_step(run, migration).await?;

            result.executed.push(migration.name().to_string());
            if verify.status == VerifyStatus::Warning {
                result.warned.push(migration.name().to_string());
            }
        }

        Ok(result)
    }

    async fn run_up_step(&self, run: &RunContext, migration: &dyn Migration) -> Result<VerifySummary> {
        let name = migration.name();
        let start_time = Instant::now();

        info!("Applying migration: {}", name);

        self.audit.start_step(run, name).await?;

        let (status, error, verify) = match self.apply(migration).await {
            Err(err) => (RunStatus::Failed, Some(err), VerifySummary::skipped()),
            Ok(verify) if verify.should_fail => {
                let err = anyhow!(
                    "Verification failed for migration {}: {}",
                    name,
                    verify.failures.join("; ")
                );
                (RunStatus::Failed, Some(err), verify)
            }
            Ok(verify) => match self.history.mark_applied(name).await {
                Ok(()) => (RunStatus::Success, None, verify),
                Err(err) => (RunStatus::Failed, Some(err), verify),
            },
        };

        self.finish_step(run, name, status, error, verify.clone())
            .await?;

        let end_time = Instant::now();
        info!(
            "Migration {} applied, verify: {}, took: {}s",
            name,
            verify.status,
            end_time.saturating_duration_since(start_time).as_secs_f32()
        );

        Ok(verify)
    }

    /// Runs `up` under a fresh tracker, then verifies what it recorded.
    async fn apply(&self, migration: &dyn Migration) -> Result<VerifySummary> {
        let name = migration.name();
        let tracker = TrackingSchemaMutator::new(&*self.mutator);

        migration
            .up(&tracker)
            .await
            .with_context(|| format!("Migration {} failed", name))?;

        let manual = migration
            .verify(&tracker)
            .await
            .with_context(|| format!("verify() of migration {} failed", name))?;

        let changes = tracker.into_changes();

        let automatic = self
            .verifier
            .verify(&*self.mutator, &changes)
            .await
            .with_context(|| format!("Failed to verify migration {}", name))?;

        let summary = combine(automatic, manual);

        match summary.status {
            VerifyStatus::Warning => warn!(
                "Migration {} verified with warnings: {}",
                name, summary.details
            ),
            VerifyStatus::Failed => error!(
                "Migration {} failed verification: {}",
                name,
                summary.failures.join("; ")
            ),
            VerifyStatus::Passed | VerifyStatus::Skipped => {
                if !changes.warnings.is_empty() {
                    info!(
                        "Migration {} verified, {} operations skipped as already applied",
                        name,
                        changes.warnings.len()
                    );
                }
            }
        }

        Ok(summary)
    }

    async fn run_down(&self, run: &RunContext) -> Result<MigrationResult> {
        let mut result = MigrationResult::new(run.run_id, run.direction);

        let applied: HashSet<String> = self.history.applied().await?.into_iter().collect();
        let Some(migration) = self
            .migrations
            .iter()
            .rev()
            .map(|m| &**m)
            .find(|m| applied.contains(m.name()))
        else {
            info!("No applied migrations to roll back");
            return Ok(result);
        };

        let name = migration.name();
        let start_time = Instant::now();

        info!("Rolling back migration: {}", name);
        warn!("Rollback of {} is not tracked or verified", name);

        self.audit.start_step(run, name).await?;

        let outcome = match migration.down(&*self.mutator).await {
            Ok(()) => self.history.remove(name).await,
            Err(err) => Err(err.context(format!("Rollback of migration {} failed", name))),
        };

        let (status, error) = match outcome {
            Ok(()) => (RunStatus::Success, None),
            Err(err) => (RunStatus::Failed, Some(err)),
        };

        self.finish_step(run, name, status, error, VerifySummary::skipped())
            .await?;

        info!(
            "Migration {} rolled back, took: {}s",
            name,
            Instant::now()
                .saturating_duration_since(start_time)
                .as_secs_f32()
        );

        result.executed.push(name.to_string());

        Ok(result)
    }

    /// Records the terminal state of a step, then surfaces its error if any.
    async fn finish_step(
        &self,
        run: &RunContext,
        name: &str,
        status: RunStatus,
        error: Option<Error>,
        verify: VerifySummary,
    ) -> Result<()> {
        let outcome = StepOutcome {
            status,
            error: error.as_ref().map(ErrorInfo::from),
            verify,
        };

        let recorded = self
            .audit
            .finish_step(run, name, &outcome)
            .await
            .with_context(|| format!("Failed to record outcome of {}", name));

        match (error, recorded) {
            (None, recorded) => recorded,
            (Some(err), Ok(())) => Err(err),
            (Some(err), Err(audit_err)) => {
                print_error_chain(&audit_err);
                Err(err.context(format!(
                    "Outcome of {} could not be recorded: {:#}",
                    name, audit_err
                )))
            }
        }
    }
}
