//! Enrichment pipeline services.

pub mod archive;
pub mod blacklist;
pub mod cleanup;
pub mod enricher;
pub mod hasher;
pub mod ingest;
pub mod mapping;
pub mod matcher;
pub mod orchestrator;
pub mod packager;

pub use cleanup::{start_cleanup_task, CleanupConfig};
pub use enricher::Enricher;
