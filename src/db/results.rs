//! Database queries for enrichment results.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entity::enrichment_result::{self as result, ActiveModel, Entity as EnrichmentResult};
use crate::error::{AppError, AppResult};

use super::DbPool;

/// One result row ready for insertion.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub file_name: String,
    pub hexacle_hash: String,
    pub found_match: bool,
    pub enriched_data: Option<JsonValue>,
    pub reference_data: JsonValue,
}

impl DbPool {
    /// Batch-insert result rows for a job.
    pub async fn insert_result_batch(&self, job_id: Uuid, rows: Vec<NewResult>) -> AppResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models: Vec<ActiveModel> = rows
            .into_iter()
            .map(|row| ActiveModel {
                job_id: Set(job_id),
                file_name: Set(row.file_name),
                hexacle_hash: Set(row.hexacle_hash),
                found_match: Set(row.found_match),
                enriched_data: Set(row.enriched_data),
                reference_data: Set(row.reference_data),
                is_blacklisted: Set(false),
                blacklist_reason: Set(None),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();

        let inserted = EnrichmentResult::insert_many(models)
            .exec_without_returning(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert results: {}", e)))?;

        Ok(inserted)
    }

    /// Read a page of result rows for a job, keyset-paginated by id.
    pub async fn get_result_page(
        &self,
        job_id: Uuid,
        after_id: i64,
        limit: u64,
    ) -> AppResult<Vec<result::Model>> {
        let rows = EnrichmentResult::find()
            .filter(result::Column::JobId.eq(job_id))
            .filter(result::Column::Id.gt(after_id))
            .order_by_asc(result::Column::Id)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to read results: {}", e)))?;

        Ok(rows)
    }

    /// Tombstone a result row that matched the blacklist.
    ///
    /// The row is flagged, never deleted, so the audit trail survives; the
    /// packager excludes flagged rows.
    pub async fn flag_result_blacklisted(&self, result_id: i64, reason: &str) -> AppResult<()> {
        EnrichmentResult::update_many()
            .col_expr(result::Column::IsBlacklisted, Expr::value(true))
            .col_expr(result::Column::BlacklistReason, Expr::value(reason))
            .filter(result::Column::Id.eq(result_id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to flag result: {}", e)))?;

        Ok(())
    }

    /// Distinct source file names among a job's results, sorted.
    pub async fn get_result_file_names(&self, job_id: Uuid) -> AppResult<Vec<String>> {
        let rows = EnrichmentResult::find()
            .select_only()
            .column(result::Column::FileName)
            .distinct()
            .filter(result::Column::JobId.eq(job_id))
            .order_by_asc(result::Column::FileName)
            .into_tuple::<String>()
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list result files: {}", e)))?;

        Ok(rows)
    }

    /// Read the exportable results for one source file: matched and not
    /// blacklisted, in insertion order.
    pub async fn get_exportable_results(
        &self,
        job_id: Uuid,
        file_name: &str,
    ) -> AppResult<Vec<result::Model>> {
        let rows = EnrichmentResult::find()
            .filter(result::Column::JobId.eq(job_id))
            .filter(result::Column::FileName.eq(file_name))
            .filter(result::Column::FoundMatch.eq(true))
            .filter(result::Column::IsBlacklisted.eq(false))
            .order_by_asc(result::Column::Id)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to read exportable results: {}", e)))?;

        Ok(rows)
    }
}
