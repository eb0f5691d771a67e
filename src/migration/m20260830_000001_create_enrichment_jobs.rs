//! Migration: Create enrichment_jobs table.
//!
//! One row per end-to-end pipeline run; the externally visible state machine.

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
                CREATE TABLE enrichment_jobs (
                    id BLOB NOT NULL PRIMARY KEY, -- UUIDv7 for time-ordered sorting
                    file_name TEXT NOT NULL,

                    -- Status transitions are one-directional:
                    -- pending -> processing -> {completed, failed}
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'processing', 'completed', 'failed')),

                    -- Cooperative cancellation flag
                    cancel_requested INTEGER NOT NULL DEFAULT 0,

                    -- Progress counters, monotonic while the job is active
                    total_records BIGINT NOT NULL DEFAULT 0,
                    processed_records BIGINT NOT NULL DEFAULT 0,
                    matched_records BIGINT NOT NULL DEFAULT 0,
                    enriched_records BIGINT NOT NULL DEFAULT 0,
                    filtered_records BIGINT NOT NULL DEFAULT 0,
                    final_records BIGINT NOT NULL DEFAULT 0,

                    -- Result artifact, set on completion
                    result_path TEXT,
                    result_size_bytes BIGINT,

                    -- Error message if status is 'failed'
                    error_message TEXT,

                    created_at TEXT NOT NULL,
                    started_at TEXT,
                    completed_at TEXT,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX idx_enrichment_jobs_status ON enrichment_jobs(status);
                CREATE INDEX idx_enrichment_jobs_created_at ON enrichment_jobs(created_at);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS enrichment_jobs;")
            .await?;

        Ok(())
    }
}
