//! Migration: Create blacklist_entries table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE blacklist_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    -- Trunk-stripped digits; uniqueness gives insert-or-ignore semantics
                    phone_number TEXT NOT NULL UNIQUE,
                    source_file TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS blacklist_entries;")
            .await?;

        Ok(())
    }
}
