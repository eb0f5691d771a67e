//! Job domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job status enum.
///
/// Transitions are one-directional: pending -> processing -> {completed, failed}.
/// Terminal states are final; counters are frozen once a job reaches one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job created, waiting for the pipeline task to pick it up.
    Pending,
    /// Pipeline stages are running.
    Processing,
    /// Pipeline finished and the result artifact is available.
    Completed,
    /// Job failed; error_message explains why.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress counters for a job.
///
/// Counters only increase while the job is active; a concurrent status reader
/// sees live progress as each stage commits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobCounters {
    /// Rows loaded into staging.
    pub total_records: i64,
    /// Rows that went through the fingerprint stage.
    pub processed_records: i64,
    /// Rows with a reference-store match.
    pub matched_records: i64,
    /// Result rows materialized (matched and unmatched).
    pub enriched_records: i64,
    /// Result rows suppressed by the blacklist filter.
    pub filtered_records: i64,
    /// Rows written to the output archive.
    pub final_records: i64,
}

/// Job status response (consumed by UI/monitoring).
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    /// Job UUID (UUIDv7, time-ordered).
    pub job_id: Uuid,
    /// Job status.
    pub status: JobStatus,
    /// Original input file name.
    pub file_name: String,
    /// Progress counters (latest committed values, also after failure).
    pub counters: JobCounters,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Download handle for the result archive, set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_download_url: Option<String>,
    /// Result archive size in bytes, set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size_bytes: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the pipeline started running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Job summary for list responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub status: JobStatus,
    pub file_name: String,
    pub final_records: i64,
    pub created_at: DateTime<Utc>,
}

/// Job list response with pagination.
#[derive(Debug, Clone, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummary>,
    /// Total number of jobs matching the filter.
    pub total: u64,
    pub limit: i32,
    pub offset: i32,
}

/// Query parameters for listing jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryJobsParams {
    /// Filter by status.
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Filter from date.
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,
    /// Filter to date.
    #[serde(default)]
    pub to_date: Option<DateTime<Utc>>,
    /// Maximum results to return.
    #[serde(default = "default_limit")]
    pub limit: i32,
    /// Offset for pagination.
    #[serde(default)]
    pub offset: i32,
}

fn default_limit() -> i32 {
    20
}

impl Default for QueryJobsParams {
    fn default() -> Self {
        QueryJobsParams {
            status: None,
            from_date: None,
            to_date: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Outcome of a batch insert (staging load or blacklist ingestion).
///
/// A flush failure must not silently drop already-processed rows: the counts
/// here reflect what actually landed, and the first few row errors are kept
/// for the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchInsertReport {
    /// Rows read from the source.
    pub rows_read: u64,
    /// Rows successfully inserted.
    pub rows_inserted: u64,
    /// Rows skipped (no mapped value, invalid, or duplicate).
    pub rows_skipped: u64,
    /// First N row-level errors (capped; the rest are logged only).
    pub errors: Vec<String>,
}

/// Maximum number of row-level errors carried back to the caller.
pub const MAX_REPORTED_ERRORS: usize = 10;

impl BatchInsertReport {
    /// Record a row-level error, keeping only the first few.
    pub fn push_error(&mut self, row: u64, message: impl std::fmt::Display) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("row {}: {}", row, message));
        }
    }

    /// Merge another report into this one (used across per-file batches).
    pub fn merge(&mut self, other: BatchInsertReport) {
        self.rows_read += other.rows_read;
        self.rows_inserted += other.rows_inserted;
        self.rows_skipped += other.rows_skipped;
        for err in other.errors {
            if self.errors.len() >= MAX_REPORTED_ERRORS {
                break;
            }
            self.errors.push(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("complete"), None);
    }

    #[test]
    fn test_transitions_are_one_directional() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_batch_report_caps_errors() {
        let mut report = BatchInsertReport::default();
        for i in 0..25 {
            report.push_error(i, "boom");
        }
        assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
    }
}
