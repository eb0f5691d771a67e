//! Migration: Create reference_contacts table.
//!
//! The authoritative contacts dataset, keyed by the address fingerprint.

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
                CREATE TABLE reference_contacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    hexacle_hash TEXT NOT NULL UNIQUE,
                    first_name TEXT,
                    last_name TEXT,
                    email TEXT,
                    mobile_phone TEXT,
                    landline_phone TEXT,
                    address TEXT,
                    city TEXT,
                    postal_code TEXT,
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
            .execute_unprepared("DROP TABLE IF EXISTS reference_contacts;")
            .await?;

        Ok(())
    }
}
