//! Enrichment job entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "enrichment_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Original input file name (CSV or ZIP)
    pub file_name: String,
    /// Job status: pending, processing, completed, failed
    pub status: String,
    /// Cooperative cancellation flag, checked at stage and batch boundaries
    pub cancel_requested: bool,
    pub total_records: i64,
    pub processed_records: i64,
    pub matched_records: i64,
    pub enriched_records: i64,
    pub filtered_records: i64,
    pub final_records: i64,
    /// Download handle for the result archive
    pub result_path: Option<String>,
    pub result_size_bytes: Option<i64>,
    /// Error message if status is 'failed'
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::staging_record::Entity")]
    StagingRecords,
    #[sea_orm(has_many = "super::enrichment_result::Entity")]
    Results,
}

impl Related<super::staging_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StagingRecords.def()
    }
}

impl Related<super::enrichment_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
