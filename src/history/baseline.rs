use anyhow::{Context, Result};

use crate::audit::{MIGRATION_RUNS_TABLE, MIGRATION_STEPS_TABLE};
use crate::catalog::Catalog;
use crate::history::{HistoryStore, MIGRATION_HISTORY_TABLE};

const ENGINE_TABLES: [&str; 3] = [
    MIGRATION_RUNS_TABLE,
    MIGRATION_STEPS_TABLE,
    MIGRATION_HISTORY_TABLE,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineOutcome {
    /// History already has entries; nothing to reconcile.
    HistoryPresent,
    /// No business tables exist; every migration runs normally.
    FreshDatabase,
    /// Legacy database: `marked` were recorded as applied without running.
    Baselined {
        marked: Vec<String>,
        excluded: Vec<String>,
    },
}

/// Reconciles a database that has business tables but no migration history.
pub struct BaselineBootstrapper<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    history: &'a dyn HistoryStore,
    exclusions: &'a [String],
}

impl<'a, C: Catalog + ?Sized> BaselineBootstrapper<'a, C> {
    pub fn new(
        catalog: &'a C,
        history: &'a dyn HistoryStore,
        exclusions: &'a [String],
    ) -> Self {
        BaselineBootstrapper {
            catalog,
            history,
            exclusions,
        }
    }

    pub async fn bootstrap(&self, migrations: &[String]) -> Result<BaselineOutcome> {
        if !self.history.applied().await?.is_empty() {
            return Ok(BaselineOutcome::HistoryPresent);
        }

        let business_tables: Vec<String> = self
            .catalog
            .list_tables()
            .await
            .context("Failed to list tables for baseline")?
            .into_iter()
            .filter(|table| !ENGINE_TABLES.iter().any(|e| e.eq_ignore_ascii_case(table)))
            .collect();

        if business_tables.is_empty() {
            debug!("No business tables found, skipping baseline");
            return Ok(BaselineOutcome::FreshDatabase);
        }

        info!(
            "Found {} existing tables without migration history, baselining",
            business_tables.len()
        );

        let (excluded, marked): (Vec<String>, Vec<String>) = migrations
            .iter()
            .cloned()
            .partition(|name| self.exclusions.contains(name));

        for name in &marked {
            self.history.mark_applied(name).await?;
            debug!("Baseline marked {} as applied", name);
        }

        if !excluded.is_empty() {
            info!("Left pending on baseline: {}", excluded.join(", "));
        }

        Ok(BaselineOutcome::Baselined { marked, excluded })
    }
}
