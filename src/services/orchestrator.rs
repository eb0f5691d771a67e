//! Batch job orchestrator: drives the enrichment pipeline stage by stage.
//!
//! Stage order is fixed: extract -> ingest -> fingerprint -> match ->
//! blacklist filter -> package. Counters are committed incrementally so a
//! concurrent status reader sees live progress, and committed counters stay
//! visible after a failure. Cancellation is cooperative, checked at stage and
//! batch boundaries.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EnrichmentConfig;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{BatchInsertReport, JobCounters, JobStatus};
use crate::services::mapping::ColumnMapping;
use crate::services::{archive, blacklist, ingest, matcher, packager};

/// Everything the pipeline needs to run one job.
pub struct JobInput {
    /// Path to the uploaded CSV or ZIP.
    pub path: PathBuf,
    /// Original file name, recorded on the job.
    pub file_name: String,
    /// Parsed column mapping for contact files.
    pub mapping: ColumnMapping,
}

/// Run the full pipeline for a job, finalizing its status.
///
/// Never panics the surrounding task: any stage error moves the job to
/// `failed` with the error message, cancellation included.
pub async fn run_enrichment_job(
    pool: DbPool,
    config: EnrichmentConfig,
    job_id: Uuid,
    input: JobInput,
    data_dir: PathBuf,
    artifact_dir: PathBuf,
) {
    let work_dir = data_dir.join("jobs").join(job_id.to_string());

    match run_pipeline(&pool, &config, job_id, &input, &work_dir, &artifact_dir).await {
        Ok(()) => info!("Job {} completed", job_id),
        Err(e) => {
            let message = e.to_string();
            error!("Job {} failed: {}", job_id, message);
            if let Err(e) = pool
                .transition_job(job_id, JobStatus::Failed, Some(message))
                .await
            {
                error!("Job {}: could not record failure: {}", job_id, e);
            }
        }
    }

    // Extracted inputs are scratch data; best-effort removal
    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Job {}: could not remove work dir: {}", job_id, e);
        }
    }
}

async fn run_pipeline(
    pool: &DbPool,
    config: &EnrichmentConfig,
    job_id: Uuid,
    input: &JobInput,
    work_dir: &Path,
    artifact_dir: &Path,
) -> AppResult<()> {
    pool.transition_job(job_id, JobStatus::Processing, None)
        .await?;

    // Stage 1: extract and classify input files
    ensure_not_cancelled(pool, job_id).await?;
    let extracted = archive::prepare_input(&input.path, work_dir).await?;
    if extracted.contact_files.is_empty() {
        return Err(AppError::InvalidInput(
            "Input contains no contact files".to_string(),
        ));
    }

    // Stage 2a: blacklist files ride along with the job input
    for path in &extracted.blacklist_files {
        ensure_not_cancelled(pool, job_id).await?;
        let name = file_name_of(path);
        let report = blacklist::ingest_blacklist_file(pool, path, &name, config).await?;
        info!(
            "Job {}: blacklist {} ingested ({} number(s))",
            job_id, name, report.rows_inserted
        );
    }

    // Stage 2b: load contact rows into staging
    let mut ingest_report = BatchInsertReport::default();
    for path in &extracted.contact_files {
        ensure_not_cancelled(pool, job_id).await?;
        let name = file_name_of(path);
        let report = ingest::load_contact_file(pool, job_id, path, &name, &input.mapping, config).await?;

        pool.bump_job_counters(
            job_id,
            JobCounters {
                total_records: report.rows_inserted as i64,
                ..Default::default()
            },
        )
        .await?;

        ingest_report.merge(report);
    }

    for err in &ingest_report.errors {
        warn!("Job {}: ingest: {}", job_id, err);
    }
    if ingest_report.rows_inserted == 0 {
        return Err(AppError::InvalidInput(format!(
            "No rows could be imported ({} read, {} skipped)",
            ingest_report.rows_read, ingest_report.rows_skipped
        )));
    }

    // Stage 3: compute fingerprints
    ensure_not_cancelled(pool, job_id).await?;
    let processed = matcher::compute_fingerprints(pool, job_id, config).await?;
    pool.bump_job_counters(
        job_id,
        JobCounters {
            processed_records: processed as i64,
            ..Default::default()
        },
    )
    .await?;

    // Stage 4: match against the reference store
    ensure_not_cancelled(pool, job_id).await?;
    let stats = matcher::match_job_records(pool, job_id, config).await?;
    for err in &stats.errors {
        warn!("Job {}: match: {}", job_id, err);
    }
    pool.bump_job_counters(
        job_id,
        JobCounters {
            matched_records: stats.matched as i64,
            enriched_records: stats.enriched as i64,
            ..Default::default()
        },
    )
    .await?;

    // Stage 5: suppress blacklisted numbers
    ensure_not_cancelled(pool, job_id).await?;
    let suppressed =
        blacklist::filter_job_results(pool, job_id, config.import_batch_size as u64).await?;
    pool.bump_job_counters(
        job_id,
        JobCounters {
            filtered_records: suppressed as i64,
            ..Default::default()
        },
    )
    .await?;

    // Stage 6: package the artifact
    ensure_not_cancelled(pool, job_id).await?;
    let job = pool.require_job(job_id).await?;
    let outcome = packager::package_job(pool, &job, artifact_dir).await?;

    pool.bump_job_counters(
        job_id,
        JobCounters {
            final_records: outcome.final_records as i64,
            ..Default::default()
        },
    )
    .await?;
    pool.set_job_result(
        job_id,
        &outcome.artifact_path.to_string_lossy(),
        outcome.size_bytes,
    )
    .await?;

    pool.transition_job(job_id, JobStatus::Completed, None)
        .await?;

    Ok(())
}

async fn ensure_not_cancelled(pool: &DbPool, job_id: Uuid) -> AppResult<()> {
    if pool.is_cancel_requested(job_id).await? {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
