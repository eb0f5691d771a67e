//! Domain models for the contact enrichment pipeline.

pub mod job;
pub mod record;

// Re-export commonly used types
pub use job::{
    BatchInsertReport, JobCounters, JobListResponse, JobStatus, JobStatusResponse, JobSummary,
    QueryJobsParams,
};
pub use record::{DestinationColumn, ImportRecord, ReferenceRecord};
