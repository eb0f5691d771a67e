//! SeaORM entity definitions.

pub mod blacklist_entry;
pub mod enrichment_job;
pub mod enrichment_result;
pub mod reference_contact;
pub mod staging_record;
