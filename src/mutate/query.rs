use crate::common::helpers::{quote_columns, quote_identifier, quote_table};
use crate::common::schema::{
    ColumnDefinition, ConstraintSpec, ConstraintType, IndexSpec, TableDefinition, TableName,
};

pub fn build_create_table_query(definition: &TableDefinition) -> String {
    let mut parts: Vec<String> = definition.columns.iter().map(build_column).collect();

    let primary_key = definition.primary_key_columns();
    if !primary_key.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", quote_columns(&primary_key)));
    }

    for column in definition.columns.iter().filter(|c| c.unique) {
        parts.push(format!("UNIQUE ({})", quote_identifier(&column.name)));
    }

    for column in &definition.columns {
        if let Some(target) = &column.references {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_identifier(&column.name),
                quote_identifier(&target.table),
                quote_columns(&target.columns)
            ));
        }
    }

    format!(
        "CREATE TABLE {} ({})",
        quote_table(&definition.table),
        parts.join(", ")
    )
}

pub fn build_add_column_query(table: &TableName, column: &ColumnDefinition) -> String {
    format!("ALTER TABLE {} ADD COLUMN {}", quote_table(table), build_column(column))
}

pub fn build_add_index_query(index: &IndexSpec) -> String {
    let name = index
        .name
        .clone()
        .unwrap_or_else(|| default_index_name(index));

    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_identifier(&name),
        quote_table(&index.table),
        quote_columns(&index.columns)
    )
}

pub fn build_add_constraint_query(constraint: &ConstraintSpec) -> String {
    let name = constraint
        .name
        .as_ref()
        .map(|name| format!("CONSTRAINT {} ", quote_identifier(name)))
        .unwrap_or_default();

    let body = match &constraint.constraint_type {
        ConstraintType::PrimaryKey => format!("PRIMARY KEY ({})", quote_columns(&constraint.columns)),
        ConstraintType::Unique => format!("UNIQUE ({})", quote_columns(&constraint.columns)),
        ConstraintType::ForeignKey { references } => format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_columns(&constraint.columns),
            quote_identifier(&references.table),
            quote_columns(&references.columns)
        ),
        ConstraintType::Check { clause } => format!("CHECK ({})", clause),
    };

    format!("ALTER TABLE {} ADD {}{}", quote_table(&constraint.table), name, body)
}

pub fn build_rename_table_query(from: &TableName, to: &TableName) -> String {
    format!("RENAME TABLE {} TO {}", quote_table(from), quote_table(to))
}

pub fn build_rename_column_query(table: &TableName, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_table(table),
        quote_identifier(from),
        quote_identifier(to)
    )
}

pub fn build_insert_statement(
    table: &TableName,
    columns: &[String],
    row_count: usize,
    ignore_duplicates: bool,
) -> String {
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![placeholders; row_count].join(", ");

    format!(
        "INSERT {}INTO {} ({}) VALUES {}",
        if ignore_duplicates { "IGNORE " } else { "" },
        quote_table(table),
        quote_columns(columns),
        values
    )
}

fn build_column(column: &ColumnDefinition) -> String {
    let mut result_str = String::new();

    result_str.push_str(&quote_identifier(&column.name));
    result_str.push(' ');
    result_str.push_str(&column.data_type);

    result_str.push_str(if column.nullable { " NULL" } else { " NOT NULL" });

    if column.auto_increment {
        result_str.push_str(" AUTO_INCREMENT");
    }

    if let Some(default) = &column.default {
        result_str.push_str(&format!(" DEFAULT {}", default));
    }

    result_str
}

pub(crate) fn default_index_name(index: &IndexSpec) -> String {
    format!(
        "{}_{}_{}",
        if index.unique { "uq" } else { "idx" },
        index.table.name,
        index.columns.join("_")
    )
}
