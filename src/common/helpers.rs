use anyhow::Error;

use crate::common::schema::TableName;

pub fn print_error_chain(err: &Error) {
    error!("{}", format_error_chain(err));
}

/// Concatenates the main context message along with its chain of causes.
pub fn format_error_chain(err: &Error) -> String {
    err.chain()
        .enumerate()
        .map(|(index, cause)| {
            if index == 0 {
                cause.to_string()
            } else {
                format!("       └> {}", cause)
            }
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Error chain plus backtrace (when captured), as stored in the audit tables.
pub fn format_error_stack(err: &Error) -> String {
    format!("{:?}", err)
}

pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

pub fn quote_table(table: &TableName) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&table.name)),
        None => quote_identifier(&table.name),
    }
}

pub fn quote_columns(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ")
}
