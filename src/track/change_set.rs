use serde::Serialize;

use crate::common::schema::{ConstraintSpec, ConstraintType, IndexSpec, TableName};

#[derive(Debug, Clone, Serialize)]
pub struct TableExpectation {
    pub table: TableName,
    /// Whether this migration created the table, as opposed to extending an existing one.
    pub created: bool,
    pub columns: Vec<String>,
    pub primary_key: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenamedTable {
    pub from: TableName,
    pub to: TableName,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedCheck {
    pub table: TableName,
    pub attempted: usize,
    pub skipped: usize,
    pub inserted: u64,
    pub identifier: Option<String>,
    pub expected_values: Vec<String>,
    pub before_count: Option<i64>,
    pub after_count: Option<i64>,
    pub duplicates_tolerated: bool,
}

/// Everything one migration intended to change, plus what it skipped.
///
/// Built fresh for every migration invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    pub tables: Vec<TableExpectation>,
    pub renamed_tables: Vec<RenamedTable>,
    pub indexes: Vec<IndexSpec>,
    pub constraints: Vec<ConstraintSpec>,
    pub seeds: Vec<SeedCheck>,
    pub warnings: Vec<String>,
    pub untracked_statements: Vec<String>,
}

impl ChangeSet {
    pub fn has_expectations(&self) -> bool {
        !(self.tables.is_empty()
            && self.renamed_tables.is_empty()
            && self.indexes.is_empty()
            && self.constraints.is_empty()
            && self.seeds.is_empty())
    }

    pub fn skipped_rows(&self) -> usize {
        self.seeds.iter().map(|seed| seed.skipped).sum()
    }

    /// Expectation for `table`, registering one for a pre-existing table if absent.
    pub fn table_mut(&mut self, table: &TableName) -> &mut TableExpectation {
        let position = self.tables.iter().position(|t| t.table.eq_ignore_case(table));

        match position {
            Some(position) => &mut self.tables[position],
            None => {
                self.tables.push(TableExpectation {
                    table: table.clone(),
                    created: false,
                    columns: Vec::new(),
                    primary_key: Vec::new(),
                });
                let last = self.tables.len() - 1;
                &mut self.tables[last]
            }
        }
    }

    pub fn expect_column(&mut self, table: &TableName, column: &str) {
        let expectation = self.table_mut(table);
        if !expectation
            .columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
        {
            expectation.columns.push(column.to_string());
        }
    }

    /// Rewrites `from` to `to` wherever an expectation on `table` names it,
    /// keeping column positions in keys and indexes.
    pub fn rename_column(&mut self, table: &TableName, from: &str, to: &str) {
        let rename = |columns: &mut Vec<String>| {
            for column in columns.iter_mut().filter(|c| c.eq_ignore_ascii_case(from)) {
                *column = to.to_string();
            }
        };

        let expectation = self.table_mut(table);
        if expectation.columns.iter().any(|c| c.eq_ignore_ascii_case(from)) {
            rename(&mut expectation.columns);
        } else if !expectation.columns.iter().any(|c| c.eq_ignore_ascii_case(to)) {
            expectation.columns.push(to.to_string());
        }
        rename(&mut expectation.primary_key);

        for index in self.indexes.iter_mut().filter(|i| i.table.eq_ignore_case(table)) {
            rename(&mut index.columns);
        }

        for constraint in &mut self.constraints {
            if constraint.table.eq_ignore_case(table) {
                rename(&mut constraint.columns);
            }
            if let ConstraintType::ForeignKey { references } = &mut constraint.constraint_type {
                if references.table.eq_ignore_ascii_case(&table.name) {
                    rename(&mut references.columns);
                }
            }
        }
    }

    /// Drops every expectation attached to `table`.
    pub fn forget_table(&mut self, table: &TableName) {
        self.tables.retain(|t| !t.table.eq_ignore_case(table));
        self.indexes.retain(|i| !i.table.eq_ignore_case(table));
        self.constraints.retain(|c| !c.table.eq_ignore_case(table));
        self.seeds.retain(|s| !s.table.eq_ignore_case(table));
    }

    /// Moves expectations recorded against `from` over to `to`.
    pub fn retarget_table(&mut self, from: &TableName, to: &TableName) {
        for expectation in self.tables.iter_mut().filter(|t| t.table.eq_ignore_case(from)) {
            expectation.table = to.clone();
        }
        for index in self.indexes.iter_mut().filter(|i| i.table.eq_ignore_case(from)) {
            index.table = to.clone();
        }
        for constraint in &mut self.constraints {
            if constraint.table.eq_ignore_case(from) {
                constraint.table = to.clone();
            }
            if let ConstraintType::ForeignKey { references } = &mut constraint.constraint_type {
                if references.table.eq_ignore_ascii_case(&from.name) {
                    references.table = to.name.clone();
                }
            }
        }
        for seed in self.seeds.iter_mut().filter(|s| s.table.eq_ignore_case(from)) {
            seed.table = to.clone();
        }
    }
}
