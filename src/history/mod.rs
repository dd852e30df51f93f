use anyhow::Result;
use async_trait::async_trait;

pub mod baseline;
pub mod mysql;

pub const MIGRATION_HISTORY_TABLE: &str = "migration_history";

/// One row per applied migration name.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn ensure_schema(&self) -> Result<()>;

    async fn applied(&self) -> Result<Vec<String>>;

    /// Idempotent: marking an applied migration again is a no-op.
    async fn mark_applied(&self, name: &str) -> Result<()>;

    async fn remove(&self, name: &str) -> Result<()>;
}
