//! Fingerprint computation and reference-store matching.

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EnrichmentConfig;
use crate::db::{DbPool, NewResult};
use crate::entity::{reference_contact, staging_record};
use crate::error::{AppError, AppResult};
use crate::services::hasher;

/// Outcome of the matching stage.
#[derive(Debug, Default, Clone)]
pub struct MatchStats {
    /// Result rows materialized (matched and unmatched).
    pub enriched: u64,
    /// Rows with a reference-store match that were materialized.
    pub matched: u64,
    /// First few batch-level failures, for the caller to surface.
    pub errors: Vec<String>,
}

/// Compute fingerprints for a job's staging rows.
///
/// Pages through staging and stores both the deterministic fingerprint and
/// the time-salted audit variant. The update is conditional on the hash being
/// unset, so a re-run after a crash never rewrites committed hashes. Returns
/// the number of rows processed.
pub async fn compute_fingerprints(
    pool: &DbPool,
    job_id: Uuid,
    config: &EnrichmentConfig,
) -> AppResult<u64> {
    let mut processed = 0u64;
    let mut after_id = 0i64;

    loop {
        // Cooperative cancellation at batch boundaries
        if pool.is_cancel_requested(job_id).await? {
            return Err(AppError::Cancelled);
        }

        let page = pool
            .get_staging_page(job_id, after_id, config.import_batch_size as u64)
            .await?;
        if page.is_empty() {
            break;
        }
        after_id = page.last().map(|r| r.id).unwrap_or(after_id);

        let now = Utc::now();
        for record in &page {
            let hash = hasher::hexacle_hash(
                record.numero.as_deref(),
                record.voie.as_deref(),
                record.ville.as_deref(),
                record.cod_post.as_deref(),
            );
            let salted = hasher::salted_hash(
                now,
                record.numero.as_deref(),
                record.voie.as_deref(),
                record.ville.as_deref(),
                record.cod_post.as_deref(),
            );

            pool.set_staging_hashes(record.id, &hash, &salted).await?;
            processed += 1;
        }
    }

    debug!("Job {}: fingerprints computed for {} row(s)", job_id, processed);

    Ok(processed)
}

/// Match a job's staging rows against the reference store.
///
/// Every staging row yields exactly one result row. Rows with an empty
/// fingerprint are never looked up and stay unmatched. Lookups go out in
/// chunks; a failed row is logged and skipped without aborting the batch.
pub async fn match_job_records(
    pool: &DbPool,
    job_id: Uuid,
    config: &EnrichmentConfig,
) -> AppResult<MatchStats> {
    let mut stats = MatchStats::default();
    let mut after_id = 0i64;

    loop {
        if pool.is_cancel_requested(job_id).await? {
            return Err(AppError::Cancelled);
        }

        let page = pool
            .get_staging_page(job_id, after_id, config.import_batch_size as u64)
            .await?;
        if page.is_empty() {
            break;
        }
        after_id = page.last().map(|r| r.id).unwrap_or(after_id);

        // Chunked exact-hash lookups; empty hashes are excluded up front
        let hashes: Vec<String> = page
            .iter()
            .filter_map(|r| r.hexacle_hash.clone())
            .filter(|h| !h.is_empty())
            .collect();

        let mut matches = std::collections::HashMap::new();
        for chunk in hashes.chunks(config.lookup_chunk_size.max(1)) {
            matches.extend(pool.find_reference_by_hashes(chunk).await?);
        }

        let mut results: Vec<NewResult> = Vec::with_capacity(page.len());
        let mut page_matched = 0u64;
        for record in &page {
            let hash = record.hexacle_hash.clone().unwrap_or_default();
            let reference = if hash.is_empty() {
                None
            } else {
                matches.get(&hash)
            };

            if reference.is_some() {
                page_matched += 1;
            }

            results.push(NewResult {
                file_name: record.file_name.clone(),
                hexacle_hash: hash,
                found_match: reference.is_some(),
                enriched_data: reference.map(contact_fields),
                reference_data: staging_fields(record),
            });
        }

        // Counters must only reflect rows that actually materialized; a lost
        // page is reported, not counted
        match pool.insert_result_batch(job_id, results).await {
            Ok(inserted) => {
                stats.enriched += inserted;
                stats.matched += page_matched;
            }
            Err(e) => {
                warn!("Job {}: failed to insert result batch: {}", job_id, e);
                if stats.errors.len() < crate::models::job::MAX_REPORTED_ERRORS {
                    stats.errors.push(format!("result batch insert failed: {}", e));
                }
            }
        }
    }

    debug!(
        "Job {}: {} result(s) materialized, {} matched",
        job_id, stats.enriched, stats.matched
    );

    Ok(stats)
}

/// Reference contact fields as a JSON object.
fn contact_fields(contact: &reference_contact::Model) -> JsonValue {
    let mut map = Map::new();
    let fields = [
        ("first_name", &contact.first_name),
        ("last_name", &contact.last_name),
        ("email", &contact.email),
        ("mobile_phone", &contact.mobile_phone),
        ("landline_phone", &contact.landline_phone),
        ("address", &contact.address),
        ("city", &contact.city),
        ("postal_code", &contact.postal_code),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            map.insert(key.to_string(), JsonValue::String(value.clone()));
        }
    }
    JsonValue::Object(map)
}

/// Original mapped row fields as a JSON object.
fn staging_fields(record: &staging_record::Model) -> JsonValue {
    let mut map = Map::new();
    map.insert(
        "source_id".to_string(),
        JsonValue::String(record.source_id.clone()),
    );
    let fields = [
        ("hexacle", &record.hexacle),
        ("numero", &record.numero),
        ("voie", &record.voie),
        ("ville", &record.ville),
        ("cod_post", &record.cod_post),
        ("cod_insee", &record.cod_insee),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            map.insert(key.to_string(), JsonValue::String(value.clone()));
        }
    }
    JsonValue::Object(map)
}
