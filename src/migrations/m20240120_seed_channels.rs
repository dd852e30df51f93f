use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::common::rows::SeedRow;
use crate::common::schema::{ColumnDefinition, TableDefinition, TableName};
use crate::migrate::Migration;
use crate::mutate::{BulkInsertOptions, SchemaMutator};
use crate::verify::VerifyResult;

const CHANNELS: [&str; 3] = ["Direct", "Partner", "Web"];

pub struct SeedChannels;

fn channel_rows() -> Vec<SeedRow> {
    CHANNELS
        .iter()
        .map(|name| {
            let mut row = SeedRow::new();
            row.insert("name".to_string(), json!(name));
            row.insert("active".to_string(), json!(true));
            row
        })
        .collect()
}

#[async_trait]
impl Migration for SeedChannels {
    fn name(&self) -> &str {
        "20240120_seed_channels"
    }

    async fn up(&self, schema: &dyn SchemaMutator) -> Result<()> {
        let channels = TableDefinition::new("channels")
            .column(ColumnDefinition::new("id", "BIGINT").primary_key().auto_increment())
            .column(ColumnDefinition::new("name", "VARCHAR(64)").not_null().unique())
            .column(
                ColumnDefinition::new("active", "TINYINT(1)")
                    .not_null()
                    .default_value("1"),
            );

        schema.create_table(&channels).await?;
        schema
            .bulk_insert(
                &channels.table,
                &channel_rows(),
                BulkInsertOptions::default(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, schema: &dyn SchemaMutator) -> Result<()> {
        schema.drop_table(&TableName::new("channels")).await
    }

    async fn verify(&self, schema: &dyn SchemaMutator) -> Result<VerifyResult> {
        let expected: Vec<String> = CHANNELS.iter().map(|c| c.to_string()).collect();
        let found = schema
            .existing_values(&TableName::new("channels"), "name", &expected)
            .await?;

        Ok(VerifyResult::from_missing(
            expected
                .into_iter()
                .filter(|name| !found.contains(name))
                .collect::<Vec<String>>(),
        ))
    }
}
