//! Migration: Create staging_records table.
//!
//! Job-scoped rows between ingestion and matching; the hash columns are filled
//! by the fingerprint stage.

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
                CREATE TABLE staging_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_id BLOB NOT NULL REFERENCES enrichment_jobs(id) ON DELETE CASCADE,
                    file_name TEXT NOT NULL,
                    source_id TEXT NOT NULL,

                    hexacle TEXT,
                    numero TEXT,
                    voie TEXT,
                    ville TEXT,
                    cod_post TEXT,
                    cod_insee TEXT,

                    -- Deterministic fingerprint (NULL until the hash stage)
                    hexacle_hash TEXT,
                    -- Time-salted audit variant, never a join key
                    salted_hash TEXT,

                    raw_data TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX idx_staging_records_job_id ON staging_records(job_id);
                CREATE INDEX idx_staging_records_hash ON staging_records(job_id, hexacle_hash);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS staging_records;")
            .await?;

        Ok(())
    }
}
