//! Database queries for blacklist entries.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set};

use crate::entity::blacklist_entry::{self as entry, ActiveModel, Entity as BlacklistEntry};
use crate::error::{AppError, AppResult};

use super::DbPool;

impl DbPool {
    /// Insert normalized phone numbers, ignoring ones already present.
    ///
    /// Relies on the unique constraint for insert-or-ignore semantics; the
    /// caller is expected to have deduplicated within the batch already.
    /// Returns the number of rows actually inserted.
    pub async fn insert_blacklist_batch(
        &self,
        numbers: &[String],
        source_file: &str,
    ) -> AppResult<u64> {
        if numbers.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models: Vec<ActiveModel> = numbers
            .iter()
            .map(|number| ActiveModel {
                phone_number: Set(number.clone()),
                source_file: Set(source_file.to_string()),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();

        let inserted = BlacklistEntry::insert_many(models)
            .on_conflict(
                OnConflict::column(entry::Column::PhoneNumber)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert blacklist batch: {}", e)))?;

        Ok(inserted)
    }

    /// Which of the given numbers are blacklisted.
    pub async fn find_blacklisted(&self, numbers: &[String]) -> AppResult<HashSet<String>> {
        if numbers.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<String> = BlacklistEntry::find()
            .select_only()
            .column(entry::Column::PhoneNumber)
            .filter(entry::Column::PhoneNumber.is_in(numbers.iter().cloned()))
            .into_tuple()
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to query blacklist: {}", e)))?;

        Ok(rows.into_iter().collect())
    }

    /// Whether any of the given numbers is blacklisted.
    pub async fn is_any_blacklisted(&self, numbers: &[String]) -> AppResult<bool> {
        Ok(!self.find_blacklisted(numbers).await?.is_empty())
    }
}
