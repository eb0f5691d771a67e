//! Cleanup service for expired job artifacts and staging data.
//!
//! The pipeline itself never deletes anything; retention is this task's job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::db::DbPool;
use crate::error::AppResult;

/// Configuration for the cleanup service.
#[derive(Clone)]
pub struct CleanupConfig {
    /// Directory where result artifacts are stored
    pub artifact_dir: PathBuf,
    /// Artifact retention period in hours
    pub retention_hours: u64,
    /// How often to run cleanup (in seconds)
    pub interval_secs: u64,
}

/// Start the cleanup background task.
///
/// Spawns a tokio task that periodically deletes result artifacts of terminal
/// jobs past the retention period and prunes their staging rows.
pub fn start_cleanup_task(pool: DbPool, config: CleanupConfig) {
    tokio::spawn(async move {
        info!(
            "Starting cleanup service (retention: {} hours, interval: {} seconds)",
            config.retention_hours, config.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(config.interval_secs));

        loop {
            ticker.tick().await;

            if let Err(e) = run_cleanup(&pool, &config).await {
                error!("Cleanup task error: {}", e);
            }
        }
    });
}

/// Run a single cleanup cycle.
pub async fn run_cleanup(pool: &DbPool, config: &CleanupConfig) -> AppResult<()> {
    let cutoff = Utc::now() - chrono::Duration::hours(config.retention_hours as i64);

    let mut artifacts_deleted = 0;
    let mut staging_pruned = 0u64;
    let mut error_count = 0;

    for job in pool.get_terminal_jobs().await? {
        let Some(completed_at) = job.completed_at else {
            continue;
        };
        if completed_at >= cutoff {
            continue;
        }

        if let Some(ref result_path) = job.result_path {
            match remove_artifact(&config.artifact_dir, result_path).await {
                Ok(true) => {
                    pool.clear_job_result(job.id).await?;
                    artifacts_deleted += 1;
                }
                Ok(false) => {
                    // Already gone; forget the stale path
                    pool.clear_job_result(job.id).await?;
                }
                Err(e) => {
                    warn!("Failed to delete artifact for job {}: {}", job.id, e);
                    error_count += 1;
                }
            }
        }

        staging_pruned += pool.delete_staging_records(job.id).await?;
    }

    if artifacts_deleted > 0 || staging_pruned > 0 || error_count > 0 {
        info!(
            "Cleanup: {} artifact(s) deleted, {} staging row(s) pruned, {} error(s)",
            artifacts_deleted, staging_pruned, error_count
        );
    }

    Ok(())
}

/// Delete an artifact file if it still exists. Only paths under the artifact
/// directory are touched. Returns true when a file was deleted.
async fn remove_artifact(artifact_dir: &Path, result_path: &str) -> AppResult<bool> {
    let path = Path::new(result_path);
    if !path.starts_with(artifact_dir) {
        warn!("Refusing to delete artifact outside artifact dir: {}", result_path);
        return Ok(false);
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
