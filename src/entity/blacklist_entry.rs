//! Blacklist entry entity (opted-out phone numbers, trunk-stripped digits).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "blacklist_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Normalized phone number, unique (insert-or-ignore semantics)
    #[sea_orm(unique)]
    pub phone_number: String,
    /// File the number was ingested from
    pub source_file: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
