//! CSV ingestion into the staging table.

use std::collections::HashMap;
use std::path::Path;

use csv::ReaderBuilder;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EnrichmentConfig;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{BatchInsertReport, ImportRecord};
use crate::services::mapping::ColumnMapping;

/// Guess the field delimiter from the header line: semicolon when it
/// outnumbers commas, comma otherwise.
pub fn sniff_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|&b| b == b'\n').next().unwrap_or(&[]);
    let semicolons = header.iter().filter(|&&b| b == b';').count();
    let commas = header.iter().filter(|&&b| b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Sniff the delimiter from a file's first bytes, without loading the file.
pub async fn sniff_file_delimiter(path: &Path) -> AppResult<u8> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut prefix = [0u8; 8192];
    let read = file.read(&mut prefix).await?;
    Ok(sniff_delimiter(&prefix[..read]))
}

/// Load one contact CSV file into staging for a job.
///
/// Rows stream from the file in a single pass and are flushed in batches, so
/// memory stays proportional to the batch size, not the file size. Row-level
/// problems (parse errors, rows with no mapped value) skip the row and are
/// reported; a batch flush failure stops the file and reports what actually
/// landed.
pub async fn load_contact_file(
    pool: &DbPool,
    job_id: Uuid,
    path: &Path,
    file_name: &str,
    mapping: &ColumnMapping,
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

    // Case-insensitive header index, built once per file
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::Csv(format!("{}: cannot read header: {}", file_name, e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut report = BatchInsertReport::default();
    let mut batch: Vec<(ImportRecord, JsonValue)> = Vec::with_capacity(config.import_batch_size);

    for (index, row) in reader.records().enumerate() {
        // Header is line 1
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

        let mut indexed: HashMap<String, String> = HashMap::with_capacity(headers.len());
        let mut raw = Map::with_capacity(headers.len());
        for (header, value) in headers.iter().zip(row.iter()) {
            indexed.insert(header.to_lowercase(), value.to_string());
            raw.insert(header.clone(), JsonValue::String(value.to_string()));
        }

        let source_id = format!("{}#{}", file_name, line);
        let record = mapping.build_record(source_id, &indexed);

        if !record.has_mapped_value() {
            report.rows_skipped += 1;
            continue;
        }

        batch.push((record, JsonValue::Object(raw)));

        if batch.len() >= config.import_batch_size {
            if !flush(pool, job_id, file_name, &mut batch, &mut report).await {
                return Ok(report);
            }
        }
    }

    if !batch.is_empty() {
        flush(pool, job_id, file_name, &mut batch, &mut report).await;
    }

    debug!(
        "Ingested {}: {} read, {} inserted, {} skipped",
        file_name, report.rows_read, report.rows_inserted, report.rows_skipped
    );

    Ok(report)
}

/// Flush the accumulated batch. Returns false when the flush failed; the
/// report then carries the inserted-so-far counts plus the failure.
async fn flush(
    pool: &DbPool,
    job_id: Uuid,
    file_name: &str,
    batch: &mut Vec<(ImportRecord, JsonValue)>,
    report: &mut BatchInsertReport,
) -> bool {
    let size = batch.len() as u64;
    match pool.insert_staging_batch(job_id, file_name, batch).await {
        Ok(inserted) => {
            report.rows_inserted += inserted;
            batch.clear();
            true
        }
        Err(e) => {
            warn!("Batch flush failed for {}: {}", file_name, e);
            report.rows_skipped += size;
            report.push_error(0, format!("batch flush failed: {}", e));
            batch.clear();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter(b"a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter(b"a,b,c\n1,2,3"), b',');
        // Tie goes to comma
        assert_eq!(sniff_delimiter(b"a\n1"), b',');
    }
}
