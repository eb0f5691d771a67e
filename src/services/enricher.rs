//! Public service facade for the enrichment pipeline.
//!
//! Submission returns a job id immediately; the pipeline runs as a spawned
//! task and persists progress to the jobs table, which is the status sink.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::ReaderBuilder;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{
    BatchInsertReport, JobCounters, JobListResponse, JobStatus, JobStatusResponse, JobSummary,
    QueryJobsParams, ReferenceRecord,
};
use crate::services::ingest::sniff_file_delimiter;
use crate::services::mapping::ColumnMapping;
use crate::services::orchestrator::{self, JobInput};
use crate::services::{blacklist, hasher};

/// The enrichment service: job submission, monitoring, and store loaders.
#[derive(Clone)]
pub struct Enricher {
    pool: DbPool,
    config: Arc<Config>,
}

impl Enricher {
    pub fn new(pool: DbPool, config: Arc<Config>) -> Self {
        Self { pool, config }
    }

    /// Submit an enrichment job for a CSV or ZIP input.
    ///
    /// The mapping JSON is validated up front; a bad mapping is rejected here
    /// instead of failing the job later. Returns the new job's id; the
    /// pipeline runs in the background.
    pub async fn submit(&self, input_path: PathBuf, mapping_json: &str) -> AppResult<Uuid> {
        let mapping = ColumnMapping::parse(mapping_json)?;

        let job_id = Uuid::now_v7();
        let file_name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input_path.to_string_lossy().into_owned());

        self.pool.insert_job(job_id, &file_name).await?;
        info!("Job {} submitted for {}", job_id, file_name);

        let input = JobInput {
            path: input_path,
            file_name,
            mapping,
        };

        tokio::spawn(orchestrator::run_enrichment_job(
            self.pool.clone(),
            self.config.enrichment_config(),
            job_id,
            input,
            self.config.data_dir.clone(),
            self.config.artifact_dir.clone(),
        ));

        Ok(job_id)
    }

    /// Current status and progress of a job.
    pub async fn status(&self, job_id: Uuid) -> AppResult<JobStatusResponse> {
        let job = self.pool.require_job(job_id).await?;

        let status = JobStatus::parse(&job.status).unwrap_or(JobStatus::Failed);

        Ok(JobStatusResponse {
            job_id: job.id,
            status,
            file_name: job.file_name,
            counters: JobCounters {
                total_records: job.total_records,
                processed_records: job.processed_records,
                matched_records: job.matched_records,
                enriched_records: job.enriched_records,
                filtered_records: job.filtered_records,
                final_records: job.final_records,
            },
            error_message: job.error_message,
            result_download_url: job.result_path,
            result_size_bytes: job.result_size_bytes,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        })
    }

    /// Request cooperative cancellation of a running job.
    pub async fn cancel(&self, job_id: Uuid) -> AppResult<()> {
        self.pool.request_job_cancel(job_id).await?;
        info!("Job {}: cancellation requested", job_id);
        Ok(())
    }

    /// List jobs with optional status/date filters and pagination.
    pub async fn list_jobs(&self, params: &QueryJobsParams) -> AppResult<JobListResponse> {
        let (jobs, total) = self.pool.query_jobs(params).await?;

        let jobs = jobs
            .into_iter()
            .map(|job| JobSummary {
                id: job.id,
                status: JobStatus::parse(&job.status).unwrap_or(JobStatus::Failed),
                file_name: job.file_name,
                final_records: job.final_records,
                created_at: job.created_at,
            })
            .collect();

        Ok(JobListResponse {
            jobs,
            total,
            limit: params.limit,
            offset: params.offset,
        })
    }

    /// Ingest a standalone blacklist CSV, outside of any job.
    pub async fn ingest_blacklist_csv(&self, path: &Path) -> AppResult<BatchInsertReport> {
        let file_name = file_name_of(path);
        blacklist::ingest_blacklist_file(
            &self.pool,
            path,
            &file_name,
            &self.config.enrichment_config(),
        )
        .await
    }

    /// Bulk-load the reference contacts store from a CSV.
    ///
    /// The fingerprint is computed from the file's `numero`, `voie`, `ville`
    /// and `cod_post` columns; contact fields come from their named columns.
    /// Rows whose fingerprint is empty are skipped.
    pub async fn load_reference_csv(&self, path: &Path) -> AppResult<BatchInsertReport> {
        let config = self.config.enrichment_config();
        let delimiter = match config.delimiter {
            Some(d) => d,
            None => sniff_file_delimiter(path).await?,
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let field = |row: &csv::StringRecord, name: &str| -> Option<String> {
            headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| row.get(i))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut report = BatchInsertReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut batch: Vec<(String, ReferenceRecord)> = Vec::with_capacity(config.import_batch_size);

        for (index, row) in reader.records().enumerate() {
            let line = (index + 2) as u64;
            report.rows_read += 1;

            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    report.rows_skipped += 1;
                    report.push_error(line, e);
                    continue;
                }
            };

            let hash = hasher::hexacle_hash(
                field(&row, "numero").as_deref(),
                field(&row, "voie").as_deref(),
                field(&row, "ville").as_deref(),
                field(&row, "cod_post").as_deref(),
            );
            if hash.is_empty() {
                report.rows_skipped += 1;
                report.push_error(line, "empty address fingerprint");
                continue;
            }
            if !seen.insert(hash.clone()) {
                report.rows_skipped += 1;
                continue;
            }

            let record = ReferenceRecord {
                first_name: field(&row, "first_name"),
                last_name: field(&row, "last_name"),
                email: field(&row, "email"),
                mobile_phone: field(&row, "mobile_phone"),
                landline_phone: field(&row, "landline_phone"),
                address: field(&row, "address"),
                city: field(&row, "city"),
                postal_code: field(&row, "postal_code"),
            };
            batch.push((hash, record));

            if batch.len() >= config.import_batch_size {
                report.rows_inserted += self.pool.upsert_reference_batch(&batch).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            report.rows_inserted += self.pool.upsert_reference_batch(&batch).await?;
        }

        info!(
            "Reference store load from {}: {} read, {} upserted, {} skipped",
            file_name_of(path),
            report.rows_read,
            report.rows_inserted,
            report.rows_skipped
        );

        Ok(report)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
