//! Database queries for the reference contacts store.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::entity::reference_contact::{self as contact, ActiveModel, Entity as ReferenceContact};
use crate::error::{AppError, AppResult};
use crate::models::ReferenceRecord;

use super::DbPool;

impl DbPool {
    /// Bulk-upsert reference contacts keyed by fingerprint. A re-import of the
    /// same fingerprint replaces the stored contact fields.
    pub async fn upsert_reference_batch(
        &self,
        rows: &[(String, ReferenceRecord)],
    ) -> AppResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models: Vec<ActiveModel> = rows
            .iter()
            .map(|(hash, record)| ActiveModel {
                hexacle_hash: Set(hash.clone()),
                first_name: Set(record.first_name.clone()),
                last_name: Set(record.last_name.clone()),
                email: Set(record.email.clone()),
                mobile_phone: Set(record.mobile_phone.clone()),
                landline_phone: Set(record.landline_phone.clone()),
                address: Set(record.address.clone()),
                city: Set(record.city.clone()),
                postal_code: Set(record.postal_code.clone()),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();

        let inserted = ReferenceContact::insert_many(models)
            .on_conflict(
                OnConflict::column(contact::Column::HexacleHash)
                    .update_columns([
                        contact::Column::FirstName,
                        contact::Column::LastName,
                        contact::Column::Email,
                        contact::Column::MobilePhone,
                        contact::Column::LandlinePhone,
                        contact::Column::Address,
                        contact::Column::City,
                        contact::Column::PostalCode,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to upsert reference batch: {}", e)))?;

        Ok(inserted)
    }

    /// Exact-match lookup of reference contacts by fingerprint.
    ///
    /// The caller chunks the hash list; empty hashes must never reach this
    /// query (an empty fingerprint is not a valid join key).
    pub async fn find_reference_by_hashes(
        &self,
        hashes: &[String],
    ) -> AppResult<HashMap<String, contact::Model>> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = ReferenceContact::find()
            .filter(contact::Column::HexacleHash.is_in(hashes.iter().cloned()))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to query reference store: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.hexacle_hash.clone(), row))
            .collect())
    }

    /// Total number of reference contacts.
    pub async fn count_reference_contacts(&self) -> AppResult<u64> {
        let count = ReferenceContact::find()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count reference store: {}", e)))?;

        Ok(count)
    }
}
