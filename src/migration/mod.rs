//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260830_000001_create_enrichment_jobs;
mod m20260830_000002_create_staging_records;
mod m20260830_000003_create_enrichment_results;
mod m20260830_000004_create_blacklist_entries;
mod m20260830_000005_create_reference_contacts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260830_000001_create_enrichment_jobs::Migration),
            Box::new(m20260830_000002_create_staging_records::Migration),
            Box::new(m20260830_000003_create_enrichment_results::Migration),
            Box::new(m20260830_000004_create_blacklist_entries::Migration),
            Box::new(m20260830_000005_create_reference_contacts::Migration),
        ]
    }
}
