use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::Catalog;
use crate::common::rows::SeedRow;
use crate::common::schema::{
    ColumnDefinition, ConstraintSpec, IndexSpec, TableDefinition, TableName,
};

pub mod mysql;
pub mod query;

#[derive(Debug, Clone, Copy, Default)]
pub struct BulkInsertOptions {
    /// Insert with `INSERT IGNORE`; rows colliding with a unique key are dropped silently.
    pub ignore_duplicates: bool,
}

/// Primitive schema and data operations available to a migration.
///
/// Every mutator can also read the catalog, so migrations and their
/// `verify` hooks can introspect through the same handle.
#[async_trait]
pub trait SchemaMutator: Catalog {
    async fn create_table(&self, definition: &TableDefinition) -> Result<()>;

    async fn add_column(&self, table: &TableName, column: &ColumnDefinition) -> Result<()>;

    async fn add_index(&self, index: &IndexSpec) -> Result<()>;

    async fn add_constraint(&self, constraint: &ConstraintSpec) -> Result<()>;

    async fn rename_table(&self, from: &TableName, to: &TableName) -> Result<()>;

    async fn rename_column(&self, table: &TableName, from: &str, to: &str) -> Result<()>;

    async fn drop_table(&self, table: &TableName) -> Result<()>;

    /// Returns the number of rows the database reports as inserted.
    async fn bulk_insert(
        &self,
        table: &TableName,
        rows: &[SeedRow],
        options: BulkInsertOptions,
    ) -> Result<u64>;

    /// Raw statement the engine cannot reason about.
    async fn execute(&self, sql: &str) -> Result<u64>;
}
