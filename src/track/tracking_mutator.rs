use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::catalog::Catalog;
use crate::common::rows::{choose_identifier, identifier_key, identifier_values, SeedRow};
use crate::common::schema::{
    ColumnDefinition, ConstraintInfo, ConstraintSpec, ConstraintType, IndexInfo, IndexSpec,
    TableDefinition, TableName,
};
use crate::mutate::{BulkInsertOptions, SchemaMutator};
use crate::track::change_set::{ChangeSet, RenamedTable, SeedCheck};
use crate::track::matching::{find_constraint, find_index};

/// Decorates a real mutator: records every intended object and skips
/// operations whose target already exists in the live catalog.
pub struct TrackingSchemaMutator<'a> {
    inner: &'a dyn SchemaMutator,
    changes: Mutex<ChangeSet>,
}

impl<'a> TrackingSchemaMutator<'a> {
    pub fn new(inner: &'a dyn SchemaMutator) -> Self {
        TrackingSchemaMutator {
            inner,
            changes: Mutex::new(ChangeSet::default()),
        }
    }

    pub fn into_changes(self) -> ChangeSet {
        self.changes
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, ChangeSet> {
        self.changes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record<F: FnOnce(&mut ChangeSet)>(&self, f: F) {
        f(&mut self.lock());
    }

    fn skip(&self, message: String) {
        warn!("{}", message);
        self.lock().warnings.push(message);
    }

    fn record_column_constraints(&self, table: &TableName, column: &ColumnDefinition) {
        let table_name = table.to_string();

        self.record(|changes| {
            if column.unique {
                changes
                    .constraints
                    .push(ConstraintSpec::unique(&table_name, &[column.name.as_str()]));
            }

            if let Some(target) = &column.references {
                changes.constraints.push(ConstraintSpec::foreign_key(
                    &table_name,
                    &[column.name.as_str()],
                    target.clone(),
                ));
            }
        });
    }

    async fn insert_by_identifier(
        &self,
        table: &TableName,
        rows: &[SeedRow],
        identifier: String,
        options: BulkInsertOptions,
    ) -> Result<u64> {
        let values = identifier_values(rows, &identifier);
        let existing = self
            .inner
            .existing_values(table, &identifier, &values)
            .await?;

        let mut seen = HashSet::new();
        let mut present = 0;
        let mut repeated = 0;
        let mut remaining = Vec::with_capacity(rows.len());

        for row in rows {
            match row.get(&identifier).and_then(identifier_key) {
                Some(key) if existing.contains(&key) => present += 1,
                Some(key) if !seen.insert(key.clone()) => repeated += 1,
                _ => remaining.push(row.clone()),
            }
        }

        if present > 0 {
            self.skip(format!(
                "Skipped {} of {} seed rows already present in {} (matched by {})",
                present,
                rows.len(),
                table,
                identifier
            ));
        }
        if repeated > 0 {
            self.skip(format!(
                "Skipped {} seed rows for {} repeating an earlier {} in the same batch",
                repeated, table, identifier
            ));
        }
        let skipped = present + repeated;

        let inserted = if remaining.is_empty() {
            0
        } else {
            self.inner.bulk_insert(table, &remaining, options).await?
        };

        self.record(|changes| {
            changes.seeds.push(SeedCheck {
                table: table.clone(),
                attempted: rows.len(),
                skipped,
                inserted,
                identifier: Some(identifier),
                expected_values: values,
                before_count: None,
                after_count: None,
                duplicates_tolerated: options.ignore_duplicates,
            })
        });

        Ok(inserted)
    }

    async fn insert_by_count(
        &self,
        table: &TableName,
        rows: &[SeedRow],
        options: BulkInsertOptions,
    ) -> Result<u64> {
        let before = self.inner.row_count(table).await?;
        let inserted = self.inner.bulk_insert(table, rows, options).await?;
        let after = self.inner.row_count(table).await?;

        let skipped = rows.len().saturating_sub(inserted as usize);
        if skipped > 0 {
            self.skip(format!(
                "{} of {} seed rows for {} were ignored as duplicates",
                skipped,
                rows.len(),
                table
            ));
        }

        self.record(|changes| {
            changes.seeds.push(SeedCheck {
                table: table.clone(),
                attempted: rows.len(),
                skipped,
                inserted,
                identifier: None,
                expected_values: Vec::new(),
                before_count: Some(before),
                after_count: Some(after),
                duplicates_tolerated: options.ignore_duplicates,
            })
        });

        Ok(inserted)
    }
}

#[async_trait]
impl<'a> Catalog for TrackingSchemaMutator<'a> {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables().await
    }

    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        self.inner.table_exists(table).await
    }

    async fn columns(&self, table: &TableName) -> Result<Vec<String>> {
        self.inner.columns(table).await
    }

    async fn indexes(&self, table: &TableName) -> Result<Vec<IndexInfo>> {
        self.inner.indexes(table).await
    }

    async fn constraints(&self, table: &TableName) -> Result<Vec<ConstraintInfo>> {
        self.inner.constraints(table).await
    }

    async fn row_count(&self, table: &TableName) -> Result<i64> {
        self.inner.row_count(table).await
    }

    async fn existing_values(
        &self,
        table: &TableName,
        column: &str,
        values: &[String],
    ) -> Result<HashSet<String>> {
        self.inner.existing_values(table, column, values).await
    }
}

#[async_trait]
impl<'a> SchemaMutator for TrackingSchemaMutator<'a> {
    async fn create_table(&self, definition: &TableDefinition) -> Result<()> {
        let exists = self.inner.table_exists(&definition.table).await?;

        self.record(|changes| {
            let expectation = changes.table_mut(&definition.table);
            expectation.created = expectation.created || !exists;
            for column in definition.column_names() {
                if !expectation.columns.contains(&column) {
                    expectation.columns.push(column);
                }
            }
            expectation.primary_key = definition.primary_key_columns();
        });

        for column in &definition.columns {
            self.record_column_constraints(&definition.table, column);
        }

        if exists {
            self.skip(format!(
                "Table {} already exists, skipping create",
                definition.table
            ));
            return Ok(());
        }

        self.inner.create_table(definition).await
    }

    async fn add_column(&self, table: &TableName, column: &ColumnDefinition) -> Result<()> {
        let columns = self.inner.columns(table).await?;

        self.record(|changes| {
            changes.expect_column(table, &column.name);
            if column.primary_key {
                changes.table_mut(table).primary_key.push(column.name.clone());
            }
        });
        self.record_column_constraints(table, column);

        if columns.iter().any(|c| c.eq_ignore_ascii_case(&column.name)) {
            self.skip(format!(
                "Column {}.{} already exists, skipping add",
                table, column.name
            ));
            return Ok(());
        }

        self.inner.add_column(table, column).await
    }

    async fn add_index(&self, index: &IndexSpec) -> Result<()> {
        let existing = self.inner.indexes(&index.table).await?;

        self.record(|changes| changes.indexes.push(index.clone()));

        if let Some(found) = find_index(index, &existing) {
            self.skip(format!(
                "Index {} already exists as {}, skipping add",
                index.describe(),
                found.name
            ));
            return Ok(());
        }

        self.inner.add_index(index).await
    }

    async fn add_constraint(&self, constraint: &ConstraintSpec) -> Result<()> {
        let existing = self.inner.constraints(&constraint.table).await?;

        self.record(|changes| {
            if constraint.constraint_type == ConstraintType::PrimaryKey {
                changes.table_mut(&constraint.table).primary_key = constraint.columns.clone();
            } else {
                changes.constraints.push(constraint.clone());
            }
        });

        if let Some(found) = find_constraint(constraint, &existing) {
            self.skip(format!(
                "Constraint {} already exists as {}, skipping add",
                constraint.describe(),
                found.name
            ));
            return Ok(());
        }

        self.inner.add_constraint(constraint).await
    }

    async fn rename_table(&self, from: &TableName, to: &TableName) -> Result<()> {
        let from_exists = self.inner.table_exists(from).await?;
        let to_exists = self.inner.table_exists(to).await?;

        self.record(|changes| {
            changes.retarget_table(from, to);
            changes.renamed_tables.push(RenamedTable {
                from: from.clone(),
                to: to.clone(),
            });
        });

        if to_exists && !from_exists {
            self.skip(format!(
                "Table {} already renamed to {}, skipping rename",
                from, to
            ));
            return Ok(());
        }

        self.inner.rename_table(from, to).await
    }

    async fn rename_column(&self, table: &TableName, from: &str, to: &str) -> Result<()> {
        let columns = self.inner.columns(table).await?;
        let has = |name: &str| columns.iter().any(|c| c.eq_ignore_ascii_case(name));

        self.record(|changes| changes.rename_column(table, from, to));

        if has(to) && !has(from) {
            self.skip(format!(
                "Column {}.{} already renamed to {}, skipping rename",
                table, from, to
            ));
            return Ok(());
        }

        self.inner.rename_column(table, from, to).await
    }

    async fn drop_table(&self, table: &TableName) -> Result<()> {
        let exists = self.inner.table_exists(table).await?;

        self.record(|changes| changes.forget_table(table));

        if !exists {
            self.skip(format!("Table {} does not exist, skipping drop", table));
            return Ok(());
        }

        self.inner.drop_table(table).await
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

        let primary_key = self
            .inner
            .primary_key(table)
            .await
            .with_context(|| format!("Failed to read primary key of {}", table))?;

        match choose_identifier(rows, &primary_key) {
            Some(identifier) => {
                self.insert_by_identifier(table, rows, identifier, options)
                    .await
            }
            None => self.insert_by_count(table, rows, options).await,
        }
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let preview: String = sql.chars().take(100).collect();
        warn!("Untracked statement executed: {}", preview);

        self.record(|changes| changes.untracked_statements.push(preview));

        self.inner.execute(sql).await
    }
}
