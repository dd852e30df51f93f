use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::common::constraints::ConstraintKind;
use crate::common::schema::{ConstraintInfo, IndexInfo, TableName};

pub mod mysql;

/// Read-only view of the live database catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Base tables of the current database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn table_exists(&self, table: &TableName) -> Result<bool>;

    /// Column names in ordinal order.
    async fn columns(&self, table: &TableName) -> Result<Vec<String>>;

    /// Indexes with their columns in index order.
    async fn indexes(&self, table: &TableName) -> Result<Vec<IndexInfo>>;

    async fn constraints(&self, table: &TableName) -> Result<Vec<ConstraintInfo>>;

    async fn row_count(&self, table: &TableName) -> Result<i64>;

    /// The subset of `values` present in `column`, in the caller's spelling.
    /// Equality follows the column's collation, so a case-insensitive column
    /// reports `web` as present when it holds `Web`.
    async fn existing_values(
        &self,
        table: &TableName,
        column: &str,
        values: &[String],
    ) -> Result<HashSet<String>>;

    async fn primary_key(&self, table: &TableName) -> Result<Vec<String>> {
        let constraints = self.constraints(table).await?;

        Ok(constraints
            .into_iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
            .map(|c| c.columns)
            .unwrap_or_default())
    }
}
