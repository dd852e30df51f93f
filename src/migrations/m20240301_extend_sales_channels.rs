use anyhow::Result;
use async_trait::async_trait;

use crate::common::schema::{
    ColumnDefinition, ConstraintSpec, ConstraintType, IndexSpec, TableName,
};
use crate::migrate::Migration;
use crate::mutate::SchemaMutator;

pub struct ExtendSalesChannels;

#[async_trait]
impl Migration for ExtendSalesChannels {
    fn name(&self) -> &str {
        "20240301_extend_sales_channels"
    }

    async fn up(&self, schema: &dyn SchemaMutator) -> Result<()> {
        let sales_channels = TableName::new("sales_channels");

        schema
            .rename_table(&TableName::new("channels"), &sales_channels)
            .await?;
        schema
            .add_column(
                &sales_channels,
                &ColumnDefinition::new("sort_order", "INT")
                    .not_null()
                    .default_value("0"),
            )
            .await?;
        schema
            .add_index(
                &IndexSpec::new("sales_channels", &["sort_order"])
                    .named("idx_sales_channels_sort_order"),
            )
            .await?;
        schema
            .add_constraint(
                &ConstraintSpec::new(
                    "sales_channels",
                    &["sort_order"],
                    ConstraintType::Check {
                        clause: "`sort_order` >= 0".to_string(),
                    },
                )
                .named("chk_sales_channels_sort_order"),
            )
            .await?;

        Ok(())
    }

    // Leaves the column, index and check behind; re-applying skips them.
    async fn down(&self, schema: &dyn SchemaMutator) -> Result<()> {
        schema
            .rename_table(&TableName::new("sales_channels"), &TableName::new("channels"))
            .await
    }
}
