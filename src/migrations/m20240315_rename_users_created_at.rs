use anyhow::Result;
use async_trait::async_trait;

use crate::common::schema::TableName;
use crate::migrate::Migration;
use crate::mutate::SchemaMutator;

pub struct RenameUsersCreatedAt;

#[async_trait]
impl Migration for RenameUsersCreatedAt {
    fn name(&self) -> &str {
        "20240315_rename_users_created_at"
    }

    async fn up(&self, schema: &dyn SchemaMutator) -> Result<()> {
        schema
            .rename_column(&TableName::new("users"), "created_at", "registered_at")
            .await
    }

    async fn down(&self, schema: &dyn SchemaMutator) -> Result<()> {
        schema
            .rename_column(&TableName::new("users"), "registered_at", "created_at")
            .await
    }
}
