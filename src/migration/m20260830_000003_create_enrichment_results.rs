//! Migration: Create enrichment_results table.
//!
//! One row per processed staging record, matched or not. Blacklisted rows are
//! flagged (tombstoned), never deleted, to keep the audit trail.

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
                CREATE TABLE enrichment_results (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_id BLOB NOT NULL REFERENCES enrichment_jobs(id) ON DELETE CASCADE,
                    file_name TEXT NOT NULL,
                    hexacle_hash TEXT NOT NULL,

                    found_match INTEGER NOT NULL DEFAULT 0,
                    -- Reference-store fields when matched; NULL iff found_match = 0
                    enriched_data TEXT,
                    -- Original row fields
                    reference_data TEXT NOT NULL,

                    -- Blacklist tombstone
                    is_blacklisted INTEGER NOT NULL DEFAULT 0,
                    blacklist_reason TEXT,

                    created_at TEXT NOT NULL
                );

                CREATE INDEX idx_enrichment_results_job_id ON enrichment_results(job_id);
                CREATE INDEX idx_enrichment_results_job_file ON enrichment_results(job_id, file_name);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS enrichment_results;")
            .await?;

        Ok(())
    }
}
