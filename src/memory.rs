//! In-process database used by tests in place of MySQL.
//!
//! Mirrors the catalog behaviour the engine relies on: unique and primary
//! keys show up both as constraints and as indexes, foreign keys get an
//! `<table>_ibfk_<n>` name, and engine tables appear once their schema
//! has been ensured.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{
    AuditStore, ErrorInfo, MigrationRunRecord, MigrationStepRecord, RunContext, RunStatus,
    StepOutcome, MIGRATION_RUNS_TABLE, MIGRATION_STEPS_TABLE,
};
use crate::catalog::Catalog;
use crate::common::constraints::ConstraintKind;
use crate::common::rows::{identifier_key, SeedRow};
use crate::common::schema::{
    ColumnDefinition, ConstraintInfo, ConstraintSpec, ConstraintType, ForeignKeyTarget, IndexInfo,
    IndexSpec, TableDefinition, TableName,
};
use crate::history::{HistoryStore, MIGRATION_HISTORY_TABLE};
use crate::mutate::query::default_index_name;
use crate::mutate::{BulkInsertOptions, SchemaMutator};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    name: String,
    columns: Vec<String>,
    auto_increment: Option<String>,
    next_id: i64,
    indexes: Vec<IndexInfo>,
    constraints: Vec<ConstraintInfo>,
    rows: Vec<SeedRow>,
}

impl MemoryTable {
    fn new(name: &str) -> Self {
        MemoryTable {
            name: name.to_string(),
            next_id: 1,
            ..MemoryTable::default()
        }
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    fn add_column(&mut self, column: &ColumnDefinition) {
        self.columns.push(column.name.clone());

        if column.auto_increment {
            self.auto_increment = Some(column.name.clone());
        }

        if column.unique {
            self.add_unique(&column.name, vec![column.name.clone()]);
        }

        if let Some(target) = &column.references {
            let name = format!(
                "{}_ibfk_{}",
                self.name,
                self.constraints
                    .iter()
                    .filter(|c| c.kind == ConstraintKind::ForeignKey)
                    .count()
                    + 1
            );
            self.add_foreign_key(&name, vec![column.name.clone()], target.clone());
        }
    }

    fn add_primary_key(&mut self, columns: Vec<String>) {
        self.indexes.push(IndexInfo {
            name: "PRIMARY".to_string(),
            columns: columns.clone(),
            unique: true,
        });
        self.constraints.push(ConstraintInfo {
            name: "PRIMARY".to_string(),
            kind: ConstraintKind::PrimaryKey,
            columns,
            references: None,
        });
    }

    fn add_unique(&mut self, name: &str, columns: Vec<String>) {
        self.indexes.push(IndexInfo {
            name: name.to_string(),
            columns: columns.clone(),
            unique: true,
        });
        self.constraints.push(ConstraintInfo {
            name: name.to_string(),
            kind: ConstraintKind::Unique,
            columns,
            references: None,
        });
    }

    fn add_foreign_key(
        &mut self,
        name: &str,
        columns: Vec<String>,
        target: ForeignKeyTarget,
    ) {
        self.indexes.push(IndexInfo {
            name: name.to_string(),
            columns: columns.clone(),
            unique: false,
        });
        self.constraints.push(ConstraintInfo {
            name: name.to_string(),
            kind: ConstraintKind::ForeignKey,
            columns,
            references: Some(target),
        });
    }

    fn unique_keys(&self) -> Vec<Vec<String>> {
        self.constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::PrimaryKey | ConstraintKind::Unique))
            .map(|c| c.columns.clone())
            .collect()
    }

    fn collides(&self, row: &SeedRow, key: &[String]) -> bool {
        let values: Option<Vec<String>> = key
            .iter()
            .map(|column| row.get(column).and_then(identifier_key))
            .collect();
        let Some(values) = values else {
            return false;
        };

        self.rows.iter().any(|existing| {
            key.iter().zip(&values).all(|(column, value)| {
                existing
                    .get(column)
                    .and_then(identifier_key)
                    .map_or(false, |existing| existing.eq_ignore_ascii_case(value))
            })
        })
    }

    fn rename_column_everywhere(&mut self, from: &str, to: &str) {
        let rename = |columns: &mut Vec<String>| {
            for column in columns.iter_mut() {
                if column.eq_ignore_ascii_case(from) {
                    *column = to.to_string();
                }
            }
        };

        rename(&mut self.columns);
        for index in &mut self.indexes {
            rename(&mut index.columns);
        }
        for constraint in &mut self.constraints {
            rename(&mut constraint.columns);
        }
        for row in &mut self.rows {
            if let Some(value) = row.remove(from) {
                row.insert(to.to_string(), value);
            }
        }
    }

    /// Rewrites foreign keys pointing at `table`, as the server does on a rename.
    fn retarget_references(&mut self, table: &str, rewrite: impl Fn(&mut ForeignKeyTarget)) {
        for constraint in &mut self.constraints {
            if let Some(target) = constraint.references.as_mut() {
                if target.table.eq_ignore_ascii_case(table) {
                    rewrite(target);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Vec<MemoryTable>,
    statements: Vec<String>,
    runs: Vec<MigrationRunRecord>,
    steps: Vec<MigrationStepRecord>,
    history: Vec<String>,
    fail_step_writes: bool,
}

impl MemoryState {
    fn position(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(table))
    }

    fn table(&self, table: &TableName) -> Result<&MemoryTable> {
        self.position(&table.name)
            .map(|position| &self.tables[position])
            .ok_or_else(|| anyhow!("Table '{}' doesn't exist", table))
    }

    fn table_mut(&mut self, table: &TableName) -> Result<&mut MemoryTable> {
        let position = self
            .position(&table.name)
            .ok_or_else(|| anyhow!("Table '{}' doesn't exist", table))?;
        Ok(&mut self.tables[position])
    }

    fn ensure_table(&mut self, name: &str, columns: &[&str]) {
        if self.position(name).is_none() {
            let mut table = MemoryTable::new(name);
            table.columns = columns.iter().map(|c| c.to_string()).collect();
            self.tables.push(table);
        }
    }

    fn step_mut(&mut self, run: &RunContext, migration: &str) -> Option<&mut MigrationStepRecord> {
        self.steps.iter_mut().find(|step| {
            step.run_id == run.run_id && step.direction == run.direction && step.migration == migration
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        MemoryDatabase::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates a table directly, bypassing any tracking.
    pub fn create_raw_table(&self, name: &str, columns: &[&str]) {
        self.lock().ensure_table(name, columns);
    }

    pub fn drop_constraint(&self, table: &str, name: &str) {
        let mut state = self.lock();
        if let Some(position) = state.position(table) {
            let table = &mut state.tables[position];
            table.constraints.retain(|c| !c.name.eq_ignore_ascii_case(name));
            table.indexes.retain(|i| !i.name.eq_ignore_ascii_case(name));
        }
    }

    pub fn drop_index(&self, table: &str, name: &str) {
        let mut state = self.lock();
        if let Some(position) = state.position(table) {
            state.tables[position]
                .indexes
                .retain(|i| !i.name.eq_ignore_ascii_case(name));
        }
    }

    /// Fails every later `finish_step` write.
    pub fn fail_step_writes(&self) {
        self.lock().fail_step_writes = true;
    }

    /// Deletes rows whose `column` equals `value` in text form.
    pub fn delete_rows(&self, table: &str, column: &str, value: &str) {
        let mut state = self.lock();
        if let Some(position) = state.position(table) {
            state.tables[position]
                .rows
                .retain(|row| row.get(column).and_then(identifier_key).as_deref() != Some(value));
        }
    }

    pub fn rows(&self, table: &str) -> Vec<SeedRow> {
        let state = self.lock();
        state
            .position(table)
            .map(|position| state.tables[position].rows.clone())
            .unwrap_or_default()
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    pub fn all_runs(&self) -> Vec<MigrationRunRecord> {
        self.lock().runs.clone()
    }
}

#[async_trait]
impl Catalog for MemoryDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.lock().tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        Ok(self.lock().position(&table.name).is_some())
    }

    async fn columns(&self, table: &TableName) -> Result<Vec<String>> {
        let state = self.lock();
        Ok(state
            .position(&table.name)
            .map(|position| state.tables[position].columns.clone())
            .unwrap_or_default())
    }

    async fn indexes(&self, table: &TableName) -> Result<Vec<IndexInfo>> {
        let state = self.lock();
        Ok(state
            .position(&table.name)
            .map(|position| state.tables[position].indexes.clone())
            .unwrap_or_default())
    }

    async fn constraints(&self, table: &TableName) -> Result<Vec<ConstraintInfo>> {
        let state = self.lock();
        Ok(state
            .position(&table.name)
            .map(|position| state.tables[position].constraints.clone())
            .unwrap_or_default())
    }

    async fn row_count(&self, table: &TableName) -> Result<i64> {
        Ok(self.lock().table(table)?.rows.len() as i64)
    }

    async fn existing_values(
        &self,
        table: &TableName,
        column: &str,
        values: &[String],
    ) -> Result<HashSet<String>> {
        let state = self.lock();
        let table = state.table(table)?;

        let stored: Vec<String> = table
            .rows
            .iter()
            .filter_map(|row| row.get(column).and_then(identifier_key))
            .collect();

        // Case-insensitive like the default collation; answers in the caller's spelling.
        Ok(values
            .iter()
            .filter(|value| stored.iter().any(|key| key.eq_ignore_ascii_case(value)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SchemaMutator for MemoryDatabase {
    async fn create_table(&self, definition: &TableDefinition) -> Result<()> {
        let mut state = self.lock();
        if state.position(&definition.table.name).is_some() {
            bail!("Table '{}' already exists", definition.table);
        }

        let mut table = MemoryTable::new(&definition.table.name);
        let primary_key = definition.primary_key_columns();
        if !primary_key.is_empty() {
            table.add_primary_key(primary_key);
        }
        for column in &definition.columns {
            table.add_column(column);
        }

        state.tables.push(table);
        Ok(())
    }

    async fn add_column(&self, table: &TableName, column: &ColumnDefinition) -> Result<()> {
        let mut state = self.lock();
        let table = state.table_mut(table)?;
        if table.has_column(&column.name) {
            bail!("Duplicate column name '{}'", column.name);
        }

        table.add_column(column);
        if column.primary_key {
            table.add_primary_key(vec![column.name.clone()]);
        }
        Ok(())
    }

    async fn add_index(&self, index: &IndexSpec) -> Result<()> {
        let mut state = self.lock();
        let table = state.table_mut(&index.table)?;
        let name = index
            .name
            .clone()
            .unwrap_or_else(|| default_index_name(index));

        if table.indexes.iter().any(|i| i.name.eq_ignore_ascii_case(&name)) {
            bail!("Duplicate key name '{}'", name);
        }

        if index.unique {
            table.add_unique(&name, index.columns.clone());
        } else {
            table.indexes.push(IndexInfo {
                name,
                columns: index.columns.clone(),
                unique: false,
            });
        }
        Ok(())
    }

    async fn add_constraint(&self, constraint: &ConstraintSpec) -> Result<()> {
        let mut state = self.lock();
        let table = state.table_mut(&constraint.table)?;
        let generated = format!("{}_chk_{}", table.name, table.constraints.len() + 1);
        let name = constraint.name.clone().unwrap_or(generated);

        match &constraint.constraint_type {
            ConstraintType::PrimaryKey => table.add_primary_key(constraint.columns.clone()),
            ConstraintType::Unique => table.add_unique(&name, constraint.columns.clone()),
            ConstraintType::ForeignKey { references } => {
                table.add_foreign_key(&name, constraint.columns.clone(), references.clone())
            }
            ConstraintType::Check { .. } => table.constraints.push(ConstraintInfo {
                name,
                kind: ConstraintKind::Check,
                columns: Vec::new(),
                references: None,
            }),
        }
        Ok(())
    }

    async fn rename_table(&self, from: &TableName, to: &TableName) -> Result<()> {
        let mut state = self.lock();
        if state.position(&to.name).is_some() {
            bail!("Table '{}' already exists", to);
        }

        state.table_mut(from)?.name = to.name.clone();
        for table in &mut state.tables {
            table.retarget_references(&from.name, |target| target.table = to.name.clone());
        }
        Ok(())
    }

    async fn rename_column(&self, table: &TableName, from: &str, to: &str) -> Result<()> {
        let mut state = self.lock();
        let table = state.table_mut(table)?;
        if !table.has_column(from) {
            bail!("Unknown column '{}'", from);
        }

        table.rename_column_everywhere(from, to);
        let name = table.name.clone();
        for table in &mut state.tables {
            table.retarget_references(&name, |target| {
                for column in target.columns.iter_mut().filter(|c| c.eq_ignore_ascii_case(from)) {
                    *column = to.to_string();
                }
            });
        }
        Ok(())
    }

    async fn drop_table(&self, table: &TableName) -> Result<()> {
        let mut state = self.lock();
        let position = state
            .position(&table.name)
            .ok_or_else(|| anyhow!("Unknown table '{}'", table))?;

        state.tables.remove(position);
        Ok(())
    }

    async fn bulk_insert(
        &self,
        table: &TableName,
        rows: &[SeedRow],
        options: BulkInsertOptions,
    ) -> Result<u64> {
        let mut state = self.lock();
        let table = state.table_mut(table)?;
        let keys = table.unique_keys();
        let mut inserted = 0;

        for row in rows {
            if let Some(unknown) = row.keys().find(|column| !table.has_column(column)) {
                bail!("Unknown column '{}' in '{}'", unknown, table.name);
            }

            let mut row = row.clone();
            if let Some(column) = table.auto_increment.clone() {
                match row.get(&column).and_then(|v| v.as_i64()) {
                    Some(id) => table.next_id = table.next_id.max(id + 1),
                    None => {
                        row.insert(column, json!(table.next_id));
                        table.next_id += 1;
                    }
                }
            }

            if let Some(key) = keys.iter().find(|key| table.collides(&row, key)) {
                if options.ignore_duplicates {
                    continue;
                }
                bail!("Duplicate entry for key ({}) in '{}'", key.join(", "), table.name);
            }

            table.rows.push(row);
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.lock().statements.push(sql.to_string());
        Ok(0)
    }
}

#[async_trait]
impl AuditStore for MemoryDatabase {
    async fn ensure_schema(&self) -> Result<()> {
        let mut state = self.lock();
        state.ensure_table(
            MIGRATION_RUNS_TABLE,
            &["id", "run_id", "direction", "status", "started_at", "finished_at"],
        );
        state.ensure_table(
            MIGRATION_STEPS_TABLE,
            &["id", "run_id", "migration_name", "direction", "status", "verify_status"],
        );
        Ok(())
    }

    async fn start_run(&self, run: &RunContext) -> Result<()> {
        self.lock().runs.push(MigrationRunRecord {
            run_id: run.run_id,
            direction: run.direction,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            environment: run.environment.clone(),
            database: run.database.clone(),
            error_message: None,
            error_stack: None,
        });
        Ok(())
    }

    async fn finish_run(
        &self,
        run: &RunContext,
        status: RunStatus,
        error: Option<&ErrorInfo>,
    ) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .runs
            .iter_mut()
            .find(|r| r.run_id == run.run_id)
            .ok_or_else(|| anyhow!("Unknown run {}", run.run_id))?;

        record.status = status;
        record.finished_at = Some(Utc::now());
        record.error_message = error.map(|e| e.message.clone());
        record.error_stack = error.map(|e| e.stack.clone());
        Ok(())
    }

    async fn start_step(&self, run: &RunContext, migration: &str) -> Result<()> {
        let mut state = self.lock();

        if let Some(step) = state.step_mut(run, migration) {
            step.status = RunStatus::Running;
            step.started_at = Utc::now();
            step.finished_at = None;
            step.error_message = None;
            step.error_stack = None;
            step.verify_status = None;
            step.verify_details = None;
            return Ok(());
        }

        state.steps.push(MigrationStepRecord {
            run_id: run.run_id,
            direction: run.direction,
            migration: migration.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error_message: None,
            error_stack: None,
            verify_status: None,
            verify_details: None,
        });
        Ok(())
    }

    async fn finish_step(
        &self,
        run: &RunContext,
        migration: &str,
        outcome: &StepOutcome,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.fail_step_writes {
            bail!("Lost connection to MySQL server during query");
        }
        let step = state
            .step_mut(run, migration)
            .ok_or_else(|| anyhow!("Unknown step {} in run {}", migration, run.run_id))?;

        step.status = outcome.status;
        step.finished_at = Some(Utc::now());
        step.error_message = outcome.error.as_ref().map(|e| e.message.clone());
        step.error_stack = outcome.error.as_ref().map(|e| e.stack.clone());
        step.verify_status = Some(outcome.verify.status);
        step.verify_details = match &outcome.verify.details {
            Value::Null => None,
            details => Some(details.clone()),
        };
        Ok(())
    }

    async fn run(&self, run_id: Uuid) -> Result<Option<MigrationRunRecord>> {
        Ok(self.lock().runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn steps(&self, run_id: Uuid) -> Result<Vec<MigrationStepRecord>> {
        Ok(self
            .lock()
            .steps
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryStore for MemoryDatabase {
    async fn ensure_schema(&self) -> Result<()> {
        self.lock()
            .ensure_table(MIGRATION_HISTORY_TABLE, &["name", "applied_at"]);
        Ok(())
    }

    async fn applied(&self) -> Result<Vec<String>> {
        Ok(self.lock().history.clone())
    }

    async fn mark_applied(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.history.iter().any(|n| n == name) {
            state.history.push(name.to_string());
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.lock().history.retain(|n| n != name);
        Ok(())
    }
}
