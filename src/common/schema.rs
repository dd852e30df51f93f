use std::fmt;

use serde::Serialize;

use crate::common::constraints::ConstraintKind;

/// Optionally schema-qualified table name. `None` means the connection's current database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: &str) -> Self {
        TableName::from(name)
    }

    pub fn eq_ignore_case(&self, other: &TableName) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && match (&self.schema, &other.schema) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => true,
            }
    }
}

impl From<&str> for TableName {
    fn from(value: &str) -> Self {
        match value.split_once('.') {
            Some((schema, name)) => TableName {
                schema: Some(schema.to_string()),
                name: name.to_string(),
            },
            None => TableName {
                schema: None,
                name: value.to_string(),
            },
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyTarget {
    pub table: String,
    pub columns: Vec<String>,
}

impl ForeignKeyTarget {
    pub fn new(table: &str, columns: &[&str]) -> Self {
        ForeignKeyTarget {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn matches(&self, other: &ForeignKeyTarget) -> bool {
        self.table.eq_ignore_ascii_case(&other.table) && same_columns(&self.columns, &other.columns)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub references: Option<ForeignKeyTarget>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: &str) -> Self {
        ColumnDefinition {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.references = Some(ForeignKeyTarget::new(table, &[column]));
        self
    }
}

#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub table: TableName,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(table: &str) -> Self {
        TableDefinition {
            table: TableName::from(table),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSpec {
    pub table: TableName,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(table: &str, columns: &[&str]) -> Self {
        IndexSpec {
            table: TableName::from(table),
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} on {}", name, self.table),
            None => format!(
                "{}index on {}({})",
                if self.unique { "unique " } else { "" },
                self.table,
                self.columns.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintType {
    PrimaryKey,
    Unique,
    ForeignKey { references: ForeignKeyTarget },
    Check { clause: String },
}

impl ConstraintType {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            ConstraintType::PrimaryKey => ConstraintKind::PrimaryKey,
            ConstraintType::Unique => ConstraintKind::Unique,
            ConstraintType::ForeignKey { .. } => ConstraintKind::ForeignKey,
            ConstraintType::Check { .. } => ConstraintKind::Check,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstraintSpec {
    pub table: TableName,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub constraint_type: ConstraintType,
}

impl ConstraintSpec {
    pub fn new(table: &str, columns: &[&str], constraint_type: ConstraintType) -> Self {
        ConstraintSpec {
            table: TableName::from(table),
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            constraint_type,
        }
    }

    pub fn unique(table: &str, columns: &[&str]) -> Self {
        ConstraintSpec::new(table, columns, ConstraintType::Unique)
    }

    pub fn primary_key(table: &str, columns: &[&str]) -> Self {
        ConstraintSpec::new(table, columns, ConstraintType::PrimaryKey)
    }

    pub fn foreign_key(table: &str, columns: &[&str], references: ForeignKeyTarget) -> Self {
        ConstraintSpec::new(table, columns, ConstraintType::ForeignKey { references })
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {} on {}", self.constraint_type.kind(), name, self.table),
            None => format!(
                "{} on {}({})",
                self.constraint_type.kind(),
                self.table,
                self.columns.join(", ")
            ),
        }
    }
}

/// Index as reported by the live catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Constraint as reported by the live catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintInfo {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    pub references: Option<ForeignKeyTarget>,
}

pub fn same_columns(expected: &[String], actual: &[String]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual.iter())
            .all(|(e, a)| e.eq_ignore_ascii_case(a))
}
