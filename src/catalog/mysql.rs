use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::MySqlPool;

use crate::catalog::Catalog;
use crate::common::constraints::ConstraintKind;
use crate::common::helpers::{quote_identifier, quote_table};
use crate::common::schema::{ConstraintInfo, ForeignKeyTarget, IndexInfo, TableName};

const EXISTING_VALUES_CHUNK: usize = 500;

/// Catalog introspection through `information_schema`.
#[derive(Clone)]
pub struct MySqlCatalog {
    pool: MySqlPool,
}

impl MySqlCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCatalog { pool }
    }
}

#[async_trait]
impl Catalog for MySqlCatalog {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.tables \
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                     ORDER BY TABLE_NAME";

        let tables: Vec<String> = sqlx::query_scalar(query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tables")?;

        Ok(tables)
    }

    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        let query = "SELECT COUNT(*) FROM information_schema.tables \
                     WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?";

        let count: i64 = sqlx::query_scalar(query)
            .bind(table.schema.clone())
            .bind(table.name.clone())
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to check existence of table {}", table))?;

        Ok(count > 0)
    }

    async fn columns(&self, table: &TableName) -> Result<Vec<String>> {
        let query = "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.columns \
                     WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ? \
                     ORDER BY ORDINAL_POSITION";

        let columns: Vec<String> = sqlx::query_scalar(query)
            .bind(table.schema.clone())
            .bind(table.name.clone())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read columns of table {}", table))?;

        Ok(columns)
    }

    async fn indexes(&self, table: &TableName) -> Result<Vec<IndexInfo>> {
        let query = "SELECT CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), \
                     CAST(NON_UNIQUE AS SIGNED) \
                     FROM information_schema.statistics \
                     WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ? \
                     ORDER BY INDEX_NAME, SEQ_IN_INDEX";

        let rows: Vec<(String, Option<String>, i64)> = sqlx::query_as(query)
            .bind(table.schema.clone())
            .bind(table.name.clone())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read indexes of table {}", table))?;

        let mut indexes: Vec<IndexInfo> = Vec::new();

        for (name, column, non_unique) in rows {
            // Functional index parts have no column name
            let Some(column) = column else { continue };

            match indexes.last_mut() {
                Some(index) if index.name == name => index.columns.push(column),
                _ => indexes.push(IndexInfo {
                    name,
                    columns: vec![column],
                    unique: non_unique == 0,
                }),
            }
        }

        Ok(indexes)
    }

    async fn constraints(&self, table: &TableName) -> Result<Vec<ConstraintInfo>> {
        let query = "SELECT CAST(tc.CONSTRAINT_NAME AS CHAR), CAST(tc.CONSTRAINT_TYPE AS CHAR), \
                     CAST(kcu.COLUMN_NAME AS CHAR), CAST(kcu.REFERENCED_TABLE_NAME AS CHAR), \
                     CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR) \
                     FROM information_schema.table_constraints tc \
                     LEFT JOIN information_schema.key_column_usage kcu \
                       ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA \
                      AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
                      AND kcu.TABLE_NAME = tc.TABLE_NAME \
                     WHERE tc.TABLE_SCHEMA = COALESCE(?, DATABASE()) AND tc.TABLE_NAME = ? \
                     ORDER BY tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

        #[allow(clippy::type_complexity)]
        let rows: Vec<(String, String, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as(query)
                .bind(table.schema.clone())
                .bind(table.name.clone())
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to read constraints of table {}", table))?;

        let mut constraints: Vec<ConstraintInfo> = Vec::new();

        for (name, constraint_type, column, referenced_table, referenced_column) in rows {
            let Some(kind) = ConstraintKind::from_catalog(&constraint_type) else {
                debug!("Ignoring constraint {} of type {}", name, constraint_type);
                continue;
            };

            if constraints.last().map_or(true, |c| c.name != name) {
                constraints.push(ConstraintInfo {
                    name,
                    kind,
                    columns: Vec::new(),
                    references: None,
                });
            }

            let Some(constraint) = constraints.last_mut() else {
                continue;
            };

            if let Some(column) = column {
                constraint.columns.push(column);
            }

            if let (Some(ref_table), Some(ref_column)) = (referenced_table, referenced_column) {
                constraint
                    .references
                    .get_or_insert_with(|| ForeignKeyTarget {
                        table: ref_table,
                        columns: Vec::new(),
                    })
                    .columns
                    .push(ref_column);
            }
        }

        Ok(constraints)
    }

    async fn row_count(&self, table: &TableName) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {}", quote_table(table));

        let count: i64 = sqlx::query_scalar(&query)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count rows of table {}", table))?;

        Ok(count)
    }

    async fn existing_values(
        &self,
        table: &TableName,
        column: &str,
        values: &[String],
    ) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in values.chunks(EXISTING_VALUES_CHUNK) {
            let query = build_existing_values_query(table, column, chunk.len());

            let mut select = sqlx::query_scalar::<_, Option<String>>(&query);
            for value in chunk {
                select = select.bind(value.clone()).bind(value.clone());
            }

            let mut stream = select.fetch(&self.pool);
            while let Some(value) = stream
                .try_next()
                .await
                .with_context(|| format!("Failed to read existing values of {}", table))?
            {
                if let Some(value) = value {
                    existing.insert(value);
                }
            }
        }

        Ok(existing)
    }
}

/// One `UNION ALL` branch per value, each echoing the bound value back when
/// the column holds an equal one. Equality is decided by the column's own
/// collation, and the caller's spelling is returned.
fn build_existing_values_query(table: &TableName, column: &str, count: usize) -> String {
    let branch = format!(
        "SELECT CAST(? AS CHAR) FROM DUAL WHERE EXISTS (SELECT 1 FROM {} WHERE {} = ?)",
        quote_table(table),
        quote_identifier(column)
    );

    vec![branch; count].join(" UNION ALL ")
}
