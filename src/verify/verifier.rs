use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::common::schema::{ConstraintInfo, ConstraintSpec, IndexInfo, TableName};
use crate::track::change_set::{ChangeSet, SeedCheck};
use crate::track::matching::{find_constraint, find_index};
use crate::verify::result::{VerifyResult, VerifyStatus, VerifySummary};

#[derive(Debug, Default, Serialize)]
pub struct VerifyReport {
    pub missing_tables: Vec<String>,
    pub missing_columns: Vec<String>,
    pub missing_indexes: Vec<String>,
    pub missing_constraints: Vec<String>,
    pub missing_seed_values: Vec<String>,
    pub lingering_tables: Vec<String>,
    pub seed_warnings: Vec<String>,
    pub untracked_statements: Vec<String>,
    pub strict: bool,
    pub warnings: Vec<String>,
    pub warning_count: usize,
    pub skipped_rows: usize,
    pub checked: CheckedCounts,
}

#[derive(Debug, Default, Serialize)]
pub struct CheckedCounts {
    pub tables: usize,
    pub columns: usize,
    pub indexes: usize,
    pub constraints: usize,
    pub seeds: usize,
}

impl VerifyReport {
    fn has_missing(&self) -> bool {
        !(self.missing_tables.is_empty()
            && self.missing_columns.is_empty()
            && self.missing_indexes.is_empty()
            && self.missing_constraints.is_empty()
            && self.missing_seed_values.is_empty()
            && self.lingering_tables.is_empty())
    }
}

/// Re-reads the live catalog to confirm a migration's tracked changes took effect.
pub struct SchemaVerifier {
    strict: bool,
}

impl SchemaVerifier {
    pub fn new(strict: bool) -> Self {
        SchemaVerifier { strict }
    }

    pub async fn verify<C: Catalog + ?Sized>(
        &self,
        catalog: &C,
        changes: &ChangeSet,
    ) -> Result<VerifySummary> {
        let mut report = VerifyReport {
            strict: self.strict,
            warnings: changes.warnings.clone(),
            warning_count: changes.warnings.len(),
            skipped_rows: changes.skipped_rows(),
            untracked_statements: changes.untracked_statements.clone(),
            ..VerifyReport::default()
        };

        let mut indexes = IndexCache::default();
        let mut constraints = ConstraintCache::default();
        let mut expected_constraints: Vec<ConstraintSpec> = Vec::new();

        for expectation in &changes.tables {
            report.checked.tables += 1;

            if !catalog.table_exists(&expectation.table).await? {
                report.missing_tables.push(expectation.table.to_string());
                continue;
            }

            let columns = catalog.columns(&expectation.table).await?;
            for column in &expectation.columns {
                report.checked.columns += 1;
                if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                    report
                        .missing_columns
                        .push(format!("{}.{}", expectation.table, column));
                }
            }

            if !expectation.primary_key.is_empty() {
                let primary_key: Vec<&str> =
                    expectation.primary_key.iter().map(String::as_str).collect();
                expected_constraints.push(ConstraintSpec::primary_key(
                    &expectation.table.to_string(),
                    &primary_key,
                ));
            }
        }

        for renamed in &changes.renamed_tables {
            report.checked.tables += 1;

            if !catalog.table_exists(&renamed.to).await? {
                report.missing_tables.push(renamed.to.to_string());
            }
            if !renamed.from.eq_ignore_case(&renamed.to) && catalog.table_exists(&renamed.from).await? {
                report.lingering_tables.push(renamed.from.to_string());
            }
        }

        for index in &changes.indexes {
            report.checked.indexes += 1;

            let actual = indexes.get(catalog, &index.table).await?;
            if find_index(index, actual).is_none() {
                report.missing_indexes.push(index.describe());
            }
        }

        expected_constraints.extend(changes.constraints.iter().cloned());
        for constraint in &expected_constraints {
            report.checked.constraints += 1;

            let actual = constraints.get(catalog, &constraint.table).await?;
            if find_constraint(constraint, actual).is_none() {
                report.missing_constraints.push(constraint.describe());
            }
        }

        for seed in &changes.seeds {
            report.checked.seeds += 1;
            self.verify_seed(catalog, seed, &mut report).await?;
        }

        Ok(self.summarize(report, changes.has_expectations()))
    }

    async fn verify_seed<C: Catalog + ?Sized>(
        &self,
        catalog: &C,
        seed: &SeedCheck,
        report: &mut VerifyReport,
    ) -> Result<()> {
        match &seed.identifier {
            Some(identifier) => {
                let found = catalog
                    .existing_values(&seed.table, identifier, &seed.expected_values)
                    .await?;

                for value in &seed.expected_values {
                    if !found.contains(value) {
                        report
                            .missing_seed_values
                            .push(format!("{}.{}={}", seed.table, identifier, value));
                    }
                }
            }
            None => {
                // Without a natural key only the row-count delta is available, and a
                // shortfall is reported as a warning rather than a failure.
                let before = seed.before_count.unwrap_or_default();
                let delta = catalog.row_count(&seed.table).await? - before;

                if delta < seed.attempted as i64 && !seed.duplicates_tolerated {
                    report.seed_warnings.push(format!(
                        "{}: row count grew by {} but {} rows were attempted",
                        seed.table, delta, seed.attempted
                    ));
                }
            }
        }

        Ok(())
    }

    fn summarize(&self, report: VerifyReport, tracked: bool) -> VerifySummary {
        let untracked = !report.untracked_statements.is_empty();

        let status = if report.has_missing() || (untracked && self.strict) {
            VerifyStatus::Failed
        } else if untracked || !report.seed_warnings.is_empty() {
            VerifyStatus::Warning
        } else if !tracked {
            VerifyStatus::Skipped
        } else {
            VerifyStatus::Passed
        };

        let mut failures: Vec<String> = Vec::new();
        for (label, items) in [
            ("missing table", &report.missing_tables),
            ("missing column", &report.missing_columns),
            ("missing index", &report.missing_indexes),
            ("missing constraint", &report.missing_constraints),
            ("missing seed row", &report.missing_seed_values),
            ("table still present after rename", &report.lingering_tables),
        ] {
            failures.extend(items.iter().map(|item| format!("{}: {}", label, item)));
        }
        if untracked && self.strict {
            failures.push(format!(
                "{} untracked statements executed under strict verification",
                report.untracked_statements.len()
            ));
        }

        VerifySummary {
            status,
            should_fail: status == VerifyStatus::Failed,
            failures,
            details: serde_json::to_value(&report).unwrap_or(Value::Null),
        }
    }
}

/// Merges the automatic catalog check with the migration's own verdict.
pub fn combine(automatic: VerifySummary, manual: VerifyResult) -> VerifySummary {
    let manual_status = manual.status();

    let status = if automatic.should_fail || manual_status == VerifyStatus::Failed {
        VerifyStatus::Failed
    } else if automatic.status == VerifyStatus::Warning || manual_status == VerifyStatus::Warning {
        VerifyStatus::Warning
    } else if automatic.status == VerifyStatus::Skipped && manual_status == VerifyStatus::Skipped {
        VerifyStatus::Skipped
    } else {
        VerifyStatus::Passed
    };

    let mut failures = automatic.failures;
    if manual_status == VerifyStatus::Failed {
        failures.push(format!("verify() reported failure: {}", manual.details()));
    }

    VerifySummary {
        status,
        should_fail: status == VerifyStatus::Failed,
        failures,
        details: json!({
            "automatic": {
                "status": automatic.status,
                "report": automatic.details,
            },
            "manual": {
                "status": manual_status,
                "details": manual.details(),
            },
        }),
    }
}

#[derive(Default)]
struct IndexCache {
    entries: HashMap<TableName, Vec<IndexInfo>>,
}

impl IndexCache {
    async fn get<C: Catalog + ?Sized>(
        &mut self,
        catalog: &C,
        table: &TableName,
    ) -> Result<&[IndexInfo]> {
        if !self.entries.contains_key(table) {
            let indexes = catalog.indexes(table).await?;
            self.entries.insert(table.clone(), indexes);
        }

        Ok(self.entries.get(table).map(Vec::as_slice).unwrap_or_default())
    }
}

#[derive(Default)]
struct ConstraintCache {
    entries: HashMap<TableName, Vec<ConstraintInfo>>,
}

impl ConstraintCache {
    async fn get<C: Catalog + ?Sized>(
        &mut self,
        catalog: &C,
        table: &TableName,
    ) -> Result<&[ConstraintInfo]> {
        if !self.entries.contains_key(table) {
            let constraints = catalog.constraints(table).await?;
            self.entries.insert(table.clone(), constraints);
        }

        Ok(self.entries.get(table).map(Vec::as_slice).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::schema::{ColumnDefinition, IndexSpec, TableDefinition};
    use crate::memory::MemoryDatabase;
    use crate::mutate::SchemaMutator;
    use crate::track::TrackingSchemaMutator;

    fn users() -> TableDefinition {
        TableDefinition::new("users")
            .column(ColumnDefinition::new("id", "BIGINT").primary_key().auto_increment())
            .column(ColumnDefinition::new("email", "VARCHAR(255)").not_null().unique())
    }

    async fn track_users(db: &MemoryDatabase) -> ChangeSet {
        let tracker = TrackingSchemaMutator::new(db);
        tracker.create_table(&users()).await.unwrap();
        tracker
            .add_index(&IndexSpec::new("users", &["email", "id"]))
            .await
            .unwrap();
        tracker.into_changes()
    }

    #[tokio::test]
    async fn applied_changes_pass() {
        let db = MemoryDatabase::new();
        let changes = track_users(&db).await;

        let summary = SchemaVerifier::new(false).verify(&db, &changes).await.unwrap();

        assert_eq!(summary.status, VerifyStatus::Passed);
        assert!(!summary.should_fail);
        assert!(summary.failures.is_empty());
        assert_eq!(summary.details["checked"]["constraints"], 2);
        assert_eq!(summary.details["warning_count"], 0);
    }

    #[tokio::test]
    async fn dropped_unique_constraint_fails_verification() {
        let db = MemoryDatabase::new();
        let changes = track_users(&db).await;
        db.drop_constraint("users", "email");

        let summary = SchemaVerifier::new(false).verify(&db, &changes).await.unwrap();

        assert_eq!(summary.status, VerifyStatus::Failed);
        assert!(summary.should_fail);
        assert_eq!(
            summary.failures,
            vec!["missing constraint: UNIQUE on users(email)".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_table_and_index_are_reported() {
        let db = MemoryDatabase::new();
        let changes = track_users(&db).await;
        db.drop_index("users", "idx_users_email_id");
        db.drop_table(&TableName::new("users")).await.unwrap();

        let summary = SchemaVerifier::new(false).verify(&db, &changes).await.unwrap();

        assert_eq!(summary.status, VerifyStatus::Failed);
        assert!(summary.failures.contains(&"missing table: users".to_string()));
        assert!(summary
            .failures
            .iter()
            .any(|f| f.starts_with("missing index:")));
    }

    #[tokio::test]
    async fn renamed_key_columns_still_verify() {
        let db = MemoryDatabase::new();
        let members = TableDefinition::new("members")
            .column(ColumnDefinition::new("org_id", "BIGINT").primary_key())
            .column(ColumnDefinition::new("user_id", "BIGINT").primary_key())
            .column(ColumnDefinition::new("email", "VARCHAR(255)").not_null().unique());

        let tracker = TrackingSchemaMutator::new(&db);
        tracker.create_table(&members).await.unwrap();
        tracker
            .rename_column(&TableName::new("members"), "org_id", "team_id")
            .await
            .unwrap();
        tracker
            .rename_column(&TableName::new("members"), "email", "mail")
            .await
            .unwrap();
        let changes = tracker.into_changes();

        assert_eq!(changes.tables[0].columns, vec!["team_id", "user_id", "mail"]);
        assert_eq!(changes.tables[0].primary_key, vec!["team_id", "user_id"]);
        assert_eq!(changes.constraints[0].columns, vec!["mail"]);

        let summary = SchemaVerifier::new(false).verify(&db, &changes).await.unwrap();

        assert_eq!(summary.status, VerifyStatus::Passed);
        assert!(summary.failures.is_empty());
    }

    #[tokio::test]
    async fn renamed_referenced_table_keeps_foreign_keys_verifiable() {
        let db = MemoryDatabase::new();
        let shifts = TableDefinition::new("shifts")
            .column(ColumnDefinition::new("id", "BIGINT").primary_key())
            .column(ColumnDefinition::new("user_id", "BIGINT").references("users", "id"));

        let tracker = TrackingSchemaMutator::new(&db);
        tracker.create_table(&users()).await.unwrap();
        tracker.create_table(&shifts).await.unwrap();
        tracker
            .rename_table(&TableName::new("users"), &TableName::new("accounts"))
            .await
            .unwrap();
        tracker
            .rename_column(&TableName::new("accounts"), "id", "account_id")
            .await
            .unwrap();
        let changes = tracker.into_changes();

        let summary = SchemaVerifier::new(false).verify(&db, &changes).await.unwrap();

        assert_eq!(summary.status, VerifyStatus::Passed);
        assert!(summary.failures.is_empty());
    }

    #[tokio::test]
    async fn untracked_statements_warn_unless_strict() {
        let db = MemoryDatabase::new();
        let mut changes = track_users(&db).await;
        changes
            .untracked_statements
            .push("UPDATE users SET email = LOWER(email)".to_string());

        let lenient = SchemaVerifier::new(false).verify(&db, &changes).await.unwrap();
        assert_eq!(lenient.status, VerifyStatus::Warning);
        assert!(!lenient.should_fail);

        let strict = SchemaVerifier::new(true).verify(&db, &changes).await.unwrap();
        assert_eq!(strict.status, VerifyStatus::Failed);
        assert!(strict.should_fail);
    }

    #[tokio::test]
    async fn missing_seed_value_fails() {
        let db = MemoryDatabase::new();
        db.create_raw_table("channels", &["id", "name"]);
        let changes = ChangeSet {
            seeds: vec![SeedCheck {
                table: TableName::new("channels"),
                attempted: 1,
                skipped: 0,
                inserted: 1,
                identifier: Some("name".to_string()),
                expected_values: vec!["Web".to_string()],
                before_count: None,
                after_count: None,
                duplicates_tolerated: false,
            }],
            ..ChangeSet::default()
        };

        let summary = SchemaVerifier::new(false).verify(&db, &changes).await.unwrap();

        assert_eq!(summary.status, VerifyStatus::Failed);
        assert_eq!(
            summary.failures,
            vec!["missing seed row: channels.name=Web".to_string()]
        );
    }

    #[tokio::test]
    async fn row_count_shortfall_only_warns() {
        let db = MemoryDatabase::new();
        db.create_raw_table("notes", &["body"]);
        let changes = ChangeSet {
            seeds: vec![SeedCheck {
                table: TableName::new("notes"),
                attempted: 2,
                skipped: 0,
                inserted: 2,
                identifier: None,
                expected_values: Vec::new(),
                before_count: Some(0),
                after_count: Some(2),
                duplicates_tolerated: false,
            }],
            ..ChangeSet::default()
        };

        let summary = SchemaVerifier::new(true).verify(&db, &changes).await.unwrap();

        assert_eq!(summary.status, VerifyStatus::Warning);
        assert!(!summary.should_fail);
    }

    #[tokio::test]
    async fn nothing_tracked_is_skipped() {
        let db = MemoryDatabase::new();

        let summary = SchemaVerifier::new(false)
            .verify(&db, &ChangeSet::default())
            .await
            .unwrap();

        assert_eq!(summary.status, VerifyStatus::Skipped);
    }

    #[test]
    fn manual_failure_overrides_automatic_pass() {
        let automatic = VerifySummary {
            status: VerifyStatus::Passed,
            should_fail: false,
            failures: Vec::new(),
            details: Value::Null,
        };

        let summary = combine(automatic, VerifyResult::from_missing(vec!["Partner"]));

        assert_eq!(summary.status, VerifyStatus::Failed);
        assert!(summary.should_fail);
        assert_eq!(summary.details["manual"]["status"], "failed");
        assert_eq!(summary.details["automatic"]["status"], "passed");
        assert!(summary.failures[0].starts_with("verify() reported failure"));
    }

    #[test]
    fn skipped_only_when_both_sides_skip() {
        let summary = combine(VerifySummary::skipped(), VerifyResult::Skipped);
        assert_eq!(summary.status, VerifyStatus::Skipped);

        let summary = combine(VerifySummary::skipped(), VerifyResult::from_bool(true));
        assert_eq!(summary.status, VerifyStatus::Passed);
    }
}
