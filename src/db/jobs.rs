//! Database queries for enrichment jobs.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::enrichment_job::{self as job, ActiveModel, Entity as Job};
use crate::error::{AppError, AppResult};
use crate::models::{JobCounters, JobStatus, QueryJobsParams};

use super::DbPool;

impl DbPool {
    /// Insert a new job in `pending` state.
    pub async fn insert_job(&self, id: Uuid, file_name: &str) -> AppResult<job::Model> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(id),
            file_name: Set(file_name.to_string()),
            status: Set(JobStatus::Pending.as_str().to_string()),
            cancel_requested: Set(false),
            total_records: Set(0),
            processed_records: Set(0),
            matched_records: Set(0),
            enriched_records: Set(0),
            filtered_records: Set(0),
            final_records: Set(0),
            result_path: Set(None),
            result_size_bytes: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            started_at: Set(None),
            completed_at: Set(None),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert job: {}", e)))?;

        Ok(result)
    }

    /// Get a job by ID.
    pub async fn get_job_by_id(&self, id: Uuid) -> AppResult<Option<job::Model>> {
        let result = Job::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job: {}", e)))?;

        Ok(result)
    }

    /// Get a job by ID, erroring when it does not exist.
    pub async fn require_job(&self, id: Uuid) -> AppResult<job::Model> {
        self.get_job_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))
    }

    /// Transition a job to a new status.
    ///
    /// Transitions are one-directional; an illegal transition (including any
    /// move out of a terminal state) is rejected with `InvalidInput`.
    /// Entering `processing` stamps `started_at`; entering a terminal state
    /// stamps `completed_at`.
    pub async fn transition_job(
        &self,
        id: Uuid,
        next: JobStatus,
        error_message: Option<String>,
    ) -> AppResult<job::Model> {
        let job = self.require_job(id).await?;

        let current = JobStatus::parse(&job.status)
            .ok_or_else(|| AppError::Database(format!("Job {} has unknown status", id)))?;

        if !current.can_transition_to(next) {
            return Err(AppError::InvalidInput(format!(
                "Illegal job transition {} -> {}",
                current, next
            )));
        }

        let now = Utc::now();
        let mut active: ActiveModel = job.into();
        active.status = Set(next.as_str().to_string());
        active.error_message = Set(error_message);
        active.updated_at = Set(now);
        if next == JobStatus::Processing {
            active.started_at = Set(Some(now));
        }
        if next.is_terminal() {
            active.completed_at = Set(Some(now));
        }

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update job status: {}", e)))?;

        Ok(result)
    }

    /// Add deltas to the job's progress counters.
    ///
    /// Counters only grow while a job is active; negative deltas are a bug and
    /// are clamped to zero.
    pub async fn bump_job_counters(&self, id: Uuid, delta: JobCounters) -> AppResult<job::Model> {
        let job = self.require_job(id).await?;

        let mut active: ActiveModel = ActiveModel {
            id: Set(id),
            total_records: Set(job.total_records + delta.total_records.max(0)),
            processed_records: Set(job.processed_records + delta.processed_records.max(0)),
            matched_records: Set(job.matched_records + delta.matched_records.max(0)),
            enriched_records: Set(job.enriched_records + delta.enriched_records.max(0)),
            filtered_records: Set(job.filtered_records + delta.filtered_records.max(0)),
            final_records: Set(job.final_records + delta.final_records.max(0)),
            ..Default::default()
        };
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update job counters: {}", e)))?;

        Ok(result)
    }

    /// Record the result artifact on a job.
    pub async fn set_job_result(
        &self,
        id: Uuid,
        result_path: &str,
        result_size_bytes: i64,
    ) -> AppResult<job::Model> {
        let job = self.require_job(id).await?;

        let mut active: ActiveModel = job.into();
        active.result_path = Set(Some(result_path.to_string()));
        active.result_size_bytes = Set(Some(result_size_bytes));
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to set job result: {}", e)))?;

        Ok(result)
    }

    /// Request cooperative cancellation of a job.
    ///
    /// Only pending/processing jobs can be cancelled; terminal jobs are final.
    pub async fn request_job_cancel(&self, id: Uuid) -> AppResult<job::Model> {
        let job = self.require_job(id).await?;

        let current = JobStatus::parse(&job.status)
            .ok_or_else(|| AppError::Database(format!("Job {} has unknown status", id)))?;
        if current.is_terminal() {
            return Err(AppError::InvalidInput(format!(
                "Job {} is already {}",
                id, current
            )));
        }

        let mut active: ActiveModel = job.into();
        active.cancel_requested = Set(true);
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to request cancel: {}", e)))?;

        Ok(result)
    }

    /// Check whether cancellation was requested for a job.
    pub async fn is_cancel_requested(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.require_job(id).await?.cancel_requested)
    }

    /// Query jobs with filtering and pagination.
    pub async fn query_jobs(&self, query: &QueryJobsParams) -> AppResult<(Vec<job::Model>, u64)> {
        let mut select = Job::find();

        if let Some(status) = query.status {
            select = select.filter(job::Column::Status.eq(status.as_str()));
        }

        if let Some(ref from_date) = query.from_date {
            select = select.filter(job::Column::CreatedAt.gte(*from_date));
        }

        if let Some(ref to_date) = query.to_date {
            select = select.filter(job::Column::CreatedAt.lte(*to_date));
        }

        // Count total before pagination
        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count jobs: {}", e)))?;

        let limit = query.limit.clamp(1, 100) as u64;
        let offset = query.offset.max(0) as u64;

        let jobs = select
            .order_by_desc(job::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to query jobs: {}", e)))?;

        Ok((jobs, total))
    }

    /// List jobs in a terminal state whose artifacts may be expired.
    pub async fn get_terminal_jobs(&self) -> AppResult<Vec<job::Model>> {
        let result = Job::find()
            .filter(
                job::Column::Status.is_in([
                    JobStatus::Completed.as_str(),
                    JobStatus::Failed.as_str(),
                ]),
            )
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list terminal jobs: {}", e)))?;

        Ok(result)
    }

    /// Clear the stored artifact path after the file has been deleted.
    pub async fn clear_job_result(&self, id: Uuid) -> AppResult<()> {
        let job = self.require_job(id).await?;

        let mut active: ActiveModel = job.into();
        active.result_path = Set(None);
        active.updated_at = Set(Utc::now());

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to clear job result: {}", e)))?;

        Ok(())
    }
}
