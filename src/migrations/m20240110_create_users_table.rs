use anyhow::Result;
use async_trait::async_trait;

use crate::common::schema::{ColumnDefinition, TableDefinition, TableName};
use crate::migrate::Migration;
use crate::mutate::SchemaMutator;

pub struct CreateUsersTable;

#[async_trait]
impl Migration for CreateUsersTable {
    fn name(&self) -> &str {
        "20240110_create_users_table"
    }

    async fn up(&self, schema: &dyn SchemaMutator) -> Result<()> {
        let users = TableDefinition::new("users")
            .column(ColumnDefinition::new("id", "BIGINT").primary_key().auto_increment())
            .column(ColumnDefinition::new("email", "VARCHAR(255)").not_null().unique())
            .column(
                ColumnDefinition::new("created_at", "DATETIME")
                    .not_null()
                    .default_value("CURRENT_TIMESTAMP"),
            );

        schema.create_table(&users).await
    }

    async fn down(&self, schema: &dyn SchemaMutator) -> Result<()> {
        schema.drop_table(&TableName::new("users")).await
    }
}
