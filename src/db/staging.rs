//! Database queries for staging records.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entity::staging_record::{self as staging, ActiveModel, Entity as StagingRecord};
use crate::error::{AppError, AppResult};
use crate::models::ImportRecord;

use super::DbPool;

impl DbPool {
    /// Batch-insert normalized rows into staging. Returns the number of rows
    /// inserted.
    pub async fn insert_staging_batch(
        &self,
        job_id: Uuid,
        file_name: &str,
        records: &[(ImportRecord, JsonValue)],
    ) -> AppResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models: Vec<ActiveModel> = records
            .iter()
            .map(|(record, raw)| ActiveModel {
                job_id: Set(job_id),
                file_name: Set(file_name.to_string()),
                source_id: Set(record.source_id.clone()),
                hexacle: Set(record.hexacle.clone()),
                numero: Set(record.numero.clone()),
                voie: Set(record.voie.clone()),
                ville: Set(record.ville.clone()),
                cod_post: Set(record.cod_post.clone()),
                cod_insee: Set(record.cod_insee.clone()),
                hexacle_hash: Set(None),
                salted_hash: Set(None),
                raw_data: Set(raw.clone()),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();

        let inserted = StagingRecord::insert_many(models)
            .exec_without_returning(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert staging batch: {}", e)))?;

        Ok(inserted)
    }

    /// Read a page of staging rows for a job, keyset-paginated by id.
    pub async fn get_staging_page(
        &self,
        job_id: Uuid,
        after_id: i64,
        limit: u64,
    ) -> AppResult<Vec<staging::Model>> {
        let result = StagingRecord::find()
            .filter(staging::Column::JobId.eq(job_id))
            .filter(staging::Column::Id.gt(after_id))
            .order_by_asc(staging::Column::Id)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to read staging page: {}", e)))?;

        Ok(result)
    }

    /// Count staging rows for a job.
    pub async fn count_staging_records(&self, job_id: Uuid) -> AppResult<u64> {
        let count = StagingRecord::find()
            .filter(staging::Column::JobId.eq(job_id))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count staging records: {}", e)))?;

        Ok(count)
    }

    /// Store the computed fingerprint on a staging row.
    ///
    /// Conditional on the hash still being unset, which makes the fingerprint
    /// stage idempotent: a re-run never overwrites committed hashes. Returns
    /// true when the row was updated.
    pub async fn set_staging_hashes(
        &self,
        record_id: i64,
        hexacle_hash: &str,
        salted_hash: &str,
    ) -> AppResult<bool> {
        let result = StagingRecord::update_many()
            .col_expr(staging::Column::HexacleHash, Expr::value(hexacle_hash))
            .col_expr(staging::Column::SaltedHash, Expr::value(salted_hash))
            .filter(staging::Column::Id.eq(record_id))
            .filter(
                Condition::any()
                    .add(staging::Column::HexacleHash.is_null())
                    .add(staging::Column::HexacleHash.eq("")),
            )
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to set staging hashes: {}", e)))?;

        Ok(result.rows_affected > 0)
    }

    /// Delete all staging rows for a job (retention cleanup).
    pub async fn delete_staging_records(&self, job_id: Uuid) -> AppResult<u64> {
        let result = StagingRecord::delete_many()
            .filter(staging::Column::JobId.eq(job_id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete staging records: {}", e)))?;

        Ok(result.rows_affected)
    }
}
