use anyhow::Result;
use async_trait::async_trait;

use crate::common::schema::{ColumnDefinition, IndexSpec, TableDefinition, TableName};
use crate::migrate::Migration;
use crate::mutate::SchemaMutator;

pub struct CreateStaffShifts;

#[async_trait]
impl Migration for CreateStaffShifts {
    fn name(&self) -> &str {
        "20240205_create_staff_shifts"
    }

    async fn up(&self, schema: &dyn SchemaMutator) -> Result<()> {
        let shifts = TableDefinition::new("staff_shifts")
            .column(ColumnDefinition::new("id", "BIGINT").primary_key().auto_increment())
            .column(
                ColumnDefinition::new("user_id", "BIGINT")
                    .not_null()
                    .references("users", "id"),
            )
            .column(ColumnDefinition::new("starts_at", "DATETIME").not_null())
            .column(ColumnDefinition::new("ends_at", "DATETIME").not_null());

        schema.create_table(&shifts).await?;
        schema
            .add_index(&IndexSpec::new("staff_shifts", &["user_id", "starts_at"]).unique())
            .await?;

        Ok(())
    }

    async fn down(&self, schema: &dyn SchemaMutator) -> Result<()> {
        schema.drop_table(&TableName::new("staff_shifts")).await
    }
}
