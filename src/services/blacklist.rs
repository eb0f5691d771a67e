//! Blacklist ingestion and suppression of opted-out phone numbers.

use std::collections::HashSet;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EnrichmentConfig;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::BatchInsertReport;
use crate::services::ingest::sniff_file_delimiter;

/// Normalize a phone number to its canonical stored form.
///
/// Keeps digits only, converts the international prefix `33` to a domestic
/// leading `0`, then strips the trunk `0` from 10-digit numbers. Numbers with
/// fewer than 9 digits are rejected as unusable.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("33") && digits.len() > 10 {
        digits.replace_range(..2, "0");
    }

    if digits.starts_with('0') && digits.len() == 10 {
        digits.remove(0);
    }

    if digits.len() < 9 {
        return None;
    }

    Some(digits)
}

/// The lookup forms a phone number is checked under: trunk-stripped and
/// trunk-prefixed. Blacklists in the wild carry both spellings.
pub fn suppression_candidates(raw: &str) -> Vec<String> {
    match normalize_phone(raw) {
        Some(stripped) => {
            let prefixed = format!("0{}", stripped);
            vec![stripped, prefixed]
        }
        None => Vec::new(),
    }
}

/// Ingest a blacklist CSV (one phone number per row, first column).
///
/// Numbers stream from the file, are normalized, deduplicated within each
/// batch, and inserted with insert-or-ignore semantics so re-imports are
/// harmless.
pub async fn ingest_blacklist_file(
    pool: &DbPool,
    path: &Path,
    file_name: &str,
    config: &EnrichmentConfig,
) -> AppResult<BatchInsertReport> {
    let delimiter = match config.delimiter {
        Some(d) => d,
        None => sniff_file_delimiter(path).await?,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(config.has_headers)
        .flexible(true)
        .from_path(path)?;

    let mut report = BatchInsertReport::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut batch: Vec<String> = Vec::with_capacity(config.blacklist_batch_size);

    for (index, row) in reader.records().enumerate() {
        let line = (index + 2) as u64;
        report.rows_read += 1;

        let row = match row {
            Ok(row) => row,
            Err(e) => {
                report.rows_skipped += 1;
                report.push_error(line, e);
                continue;
            }
        };

        let Some(number) = row.get(0).and_then(normalize_phone) else {
            report.rows_skipped += 1;
            report.push_error(line, "invalid phone number");
            continue;
        };

        if !seen.insert(number.clone()) {
            report.rows_skipped += 1;
            continue;
        }

        batch.push(number);

        if batch.len() >= config.blacklist_batch_size {
            report.rows_inserted += pool.insert_blacklist_batch(&batch, file_name).await?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        report.rows_inserted += pool.insert_blacklist_batch(&batch, file_name).await?;
    }

    info!(
        "Blacklist {}: {} read, {} inserted, {} skipped",
        file_name, report.rows_read, report.rows_inserted, report.rows_skipped
    );

    Ok(report)
}

/// Suppress blacklisted result rows for a job.
///
/// Walks the job's results in pages; for each matched row, the reference
/// contact's mobile and landline numbers are checked in both lookup forms.
/// Hits are tombstoned, not deleted. Returns the number of rows suppressed.
pub async fn filter_job_results(
    pool: &DbPool,
    job_id: Uuid,
    page_size: u64,
) -> AppResult<u64> {
    let mut suppressed = 0u64;
    let mut after_id = 0i64;

    loop {
        if pool.is_cancel_requested(job_id).await? {
            return Err(AppError::Cancelled);
        }

        let page = pool.get_result_page(job_id, after_id, page_size).await?;
        if page.is_empty() {
            break;
        }
        after_id = page.last().map(|r| r.id).unwrap_or(after_id);

        // Candidates for the whole page, one blacklist query per page
        let mut candidates: Vec<String> = Vec::new();
        for row in &page {
            for number in result_phone_numbers(row) {
                candidates.extend(suppression_candidates(&number));
            }
        }
        candidates.sort();
        candidates.dedup();

        let blacklisted = pool.find_blacklisted(&candidates).await?;
        if blacklisted.is_empty() {
            continue;
        }

        for row in &page {
            if row.is_blacklisted || !row.found_match {
                continue;
            }

            let hit = result_phone_numbers(row).into_iter().find(|number| {
                suppression_candidates(number)
                    .iter()
                    .any(|form| blacklisted.contains(form))
            });

            if let Some(number) = hit {
                let reason = format!("phone {} is blacklisted", number);
                pool.flag_result_blacklisted(row.id, &reason).await?;
                suppressed += 1;
            }
        }
    }

    debug!("Job {}: {} result(s) suppressed by blacklist", job_id, suppressed);

    Ok(suppressed)
}

/// Phone numbers attached to a result row's enriched contact.
fn result_phone_numbers(row: &crate::entity::enrichment_result::Model) -> Vec<String> {
    let Some(enriched) = row.enriched_data.as_ref().and_then(|v| v.as_object()) else {
        return Vec::new();
    };

    ["mobile_phone", "landline_phone"]
        .iter()
        .filter_map(|key| enriched.get(*key))
        .filter_map(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_strips_trunk_zero() {
        assert_eq!(normalize_phone("0612345678").as_deref(), Some("612345678"));
    }

    #[test]
    fn test_normalize_phone_handles_international_prefix() {
        assert_eq!(normalize_phone("33612345678").as_deref(), Some("612345678"));
        assert_eq!(normalize_phone("+33 6 12 34 56 78").as_deref(), Some("612345678"));
    }

    #[test]
    fn test_normalize_phone_keeps_non_digit_noise_out() {
        assert_eq!(normalize_phone("06.12.34.56.78").as_deref(), Some("612345678"));
    }

    #[test]
    fn test_normalize_phone_rejects_short_numbers() {
        assert_eq!(normalize_phone("12345678"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_suppression_candidates_cover_both_forms() {
        let forms = suppression_candidates("0612345678");
        assert_eq!(forms, vec!["612345678".to_string(), "0612345678".to_string()]);
        assert!(suppression_candidates("123").is_empty());
    }
}
