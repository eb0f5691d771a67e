//! Staging record entity (job-scoped rows between ingestion and matching).

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "staging_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub job_id: Uuid,
    /// Name of the source file within the job's input
    pub file_name: String,
    /// Origin identifier (file/job scoped)
    pub source_id: String,
    pub hexacle: Option<String>,
    pub numero: Option<String>,
    pub voie: Option<String>,
    pub ville: Option<String>,
    pub cod_post: Option<String>,
    pub cod_insee: Option<String>,
    /// Deterministic address fingerprint; NULL until the hash stage runs
    pub hexacle_hash: Option<String>,
    /// Time-salted variant kept for audit/dedup only, never a join key
    pub salted_hash: Option<String>,
    /// Raw source row as parsed
    #[sea_orm(column_type = "Json")]
    pub raw_data: JsonValue,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enrichment_job::Entity",
        from = "Column::JobId",
        to = "super::enrichment_job::Column::Id",
        on_delete = "Cascade"
    )]
    Job,
}

impl Related<super::enrichment_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
