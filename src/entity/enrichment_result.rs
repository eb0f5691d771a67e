//! Enrichment result entity (outcome of matching one staging record).

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "enrichment_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub job_id: Uuid,
    /// Originating file name, used for grouping during packaging
    pub file_name: String,
    pub hexacle_hash: String,
    pub found_match: bool,
    /// Reference-store fields when matched; NULL iff found_match is false
    #[sea_orm(column_type = "Json", nullable)]
    pub enriched_data: Option<JsonValue>,
    /// Original row fields
    #[sea_orm(column_type = "Json")]
    pub reference_data: JsonValue,
    /// Blacklist tombstone; flagged rows are excluded from packaging
    pub is_blacklisted: bool,
    pub blacklist_reason: Option<String>,
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
