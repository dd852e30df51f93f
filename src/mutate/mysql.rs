use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::{Executor, MySqlPool};

use crate::catalog::mysql::MySqlCatalog;
use crate::catalog::Catalog;
use crate::common::helpers::quote_table;
use crate::common::rows::SeedRow;
use crate::common::schema::{
    ColumnDefinition, ConstraintInfo, ConstraintSpec, IndexInfo, IndexSpec, TableDefinition,
    TableName,
};
use crate::mutate::query::{
    build_add_column_query, build_add_constraint_query, build_add_index_query,
    build_create_table_query, build_insert_statement, build_rename_column_query,
    build_rename_table_query,
};
use crate::mutate::{BulkInsertOptions, SchemaMutator};

const MAX_ROWS_PER_STATEMENT: usize = 500;

/// Executes migration primitives against MySQL.
#[derive(Clone)]
pub struct MySqlSchemaMutator {
    pool: MySqlPool,
    catalog: MySqlCatalog,
}

impl MySqlSchemaMutator {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlSchemaMutator {
            catalog: MySqlCatalog::new(pool.clone()),
            pool,
        }
    }

    async fn execute_statement(&self, query: &str) -> Result<u64> {
        let preview: String = query.chars().take(100).collect();
        debug!("Executing: {}", preview);

        let result = self
            .pool
            .execute(query)
            .await
            .with_context(|| format!("Cannot execute query: {}", preview))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Catalog for MySqlSchemaMutator {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.catalog.list_tables().await
    }

    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        self.catalog.table_exists(table).await
    }

    async fn columns(&self, table: &TableName) -> Result<Vec<String>> {
        self.catalog.columns(table).await
    }

    async fn indexes(&self, table: &TableName) -> Result<Vec<IndexInfo>> {
        self.catalog.indexes(table).await
    }

    async fn constraints(&self, table: &TableName) -> Result<Vec<ConstraintInfo>> {
        self.catalog.constraints(table).await
    }

    async fn row_count(&self, table: &TableName) -> Result<i64> {
        self.catalog.row_count(table).await
    }

    async fn existing_values(
        &self,
        table: &TableName,
        column: &str,
        values: &[String],
    ) -> Result<HashSet<String>> {
        self.catalog.existing_values(table, column, values).await
    }
}

#[async_trait]
impl SchemaMutator for MySqlSchemaMutator {
    async fn create_table(&self, definition: &TableDefinition) -> Result<()> {
        self.execute_statement(&build_create_table_query(definition))
            .await
            .with_context(|| format!("Encountered an error while creating table {}", definition.table))?;

        info!("Table {} created successfully", definition.table);

        Ok(())
    }

    async fn add_column(&self, table: &TableName, column: &ColumnDefinition) -> Result<()> {
        self.execute_statement(&build_add_column_query(table, column))
            .await
            .with_context(|| format!("Failed to add column {} to {}", column.name, table))?;

        Ok(())
    }

    async fn add_index(&self, index: &IndexSpec) -> Result<()> {
        self.execute_statement(&build_add_index_query(index))
            .await
            .with_context(|| format!("Failed to add {}", index.describe()))?;

        Ok(())
    }

    async fn add_constraint(&self, constraint: &ConstraintSpec) -> Result<()> {
        self.execute_statement(&build_add_constraint_query(constraint))
            .await
            .with_context(|| format!("Failed to add {}", constraint.describe()))?;

        Ok(())
    }

    async fn rename_table(&self, from: &TableName, to: &TableName) -> Result<()> {
        self.execute_statement(&build_rename_table_query(from, to))
            .await
            .with_context(|| format!("Failed to rename table {} to {}", from, to))?;

        Ok(())
    }

    async fn rename_column(&self, table: &TableName, from: &str, to: &str) -> Result<()> {
        self.execute_statement(&build_rename_column_query(table, from, to))
            .await
            .with_context(|| format!("Failed to rename column {}.{} to {}", table, from, to))?;

        Ok(())
    }

    async fn drop_table(&self, table: &TableName) -> Result<()> {
        self.execute_statement(&format!("DROP TABLE {}", quote_table(table)))
            .await
            .with_context(|| format!("Failed to drop table {}", table))?;

        Ok(())
    }

    async fn bulk_insert(
        &self,
        table: &TableName,
        rows: &[SeedRow],
        options: BulkInsertOptions,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let columns = collect_columns(rows);
        let mut transaction = self.pool.begin().await?;
        let mut inserted = 0;

        for batch in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let statement =
                build_insert_statement(table, &columns, batch.len(), options.ignore_duplicates);

            let mut query = sqlx::query(&statement);
            for row in batch {
                for column in &columns {
                    query = bind_value(query, row.get(column).unwrap_or(&Value::Null));
                }
            }

            match query.execute(&mut transaction).await {
                Ok(result) => inserted += result.rows_affected(),
                Err(err) => {
                    transaction.rollback().await?;
                    return Err(anyhow!(err))
                        .with_context(|| format!("Failed to insert seed rows into {}", table));
                }
            }
        }

        transaction.commit().await?;

        debug!("Inserted {} rows into {}", inserted, table);

        Ok(inserted)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.execute_statement(sql).await
    }
}

/// Column set across all rows, in order of first appearance.
fn collect_columns(rows: &[SeedRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();

    for row in rows {
        for column in row.keys() {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }

    columns
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => query.bind(i),
            (None, Some(f)) => query.bind(f),
            (None, None) => query.bind(n.to_string()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
    }
}
