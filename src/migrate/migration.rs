use anyhow::Result;
use async_trait::async_trait;

use crate::mutate::SchemaMutator;
use crate::verify::VerifyResult;

/// A named, ordered unit of schema or data change.
///
/// `up` receives a tracking mutator: every primitive it calls is recorded and
/// verified against the live catalog afterwards. `down` receives the raw
/// mutator and is neither tracked nor verified.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    async fn up(&self, schema: &dyn SchemaMutator) -> Result<()>;

    async fn down(&self, schema: &dyn SchemaMutator) -> Result<()>;

    /// Extra checks beyond what the tracker can infer. Runs after `up`.
    async fn verify(&self, _schema: &dyn SchemaMutator) -> Result<VerifyResult> {
        Ok(VerifyResult::Skipped)
    }
}
