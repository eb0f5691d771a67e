//! Result artifact packaging: enriched CSVs plus a summary, zipped.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::WriterBuilder;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::db::DbPool;
use crate::entity::enrichment_job;
use crate::entity::enrichment_result;
use crate::error::{AppError, AppResult};

/// Bookkeeping fields that never appear in the output header.
const EXCLUDED_FIELDS: [&str; 1] = ["source_id"];

/// Outcome of the packaging stage.
#[derive(Debug)]
pub struct PackageOutcome {
    pub artifact_path: PathBuf,
    pub size_bytes: i64,
    /// Rows written across all enriched CSVs.
    pub final_records: u64,
    /// Number of source files that failed to package.
    pub failed_groups: u64,
}

/// Package a job's exportable results into one ZIP artifact.
///
/// Results are grouped by source file; blacklisted and unmatched rows are
/// excluded. Each group becomes `<original>_enriched.csv` with a sorted union
/// header over the group's fields. A failing group is logged and skipped, the
/// other groups still ship. The archive always carries
/// `enrichment_summary.txt`.
pub async fn package_job(
    pool: &DbPool,
    job: &enrichment_job::Model,
    artifact_dir: &Path,
) -> AppResult<PackageOutcome> {
    tokio::fs::create_dir_all(artifact_dir).await?;

    let mut csv_files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut per_file_counts: Vec<(String, u64)> = Vec::new();
    let mut final_records = 0u64;
    let mut failed_groups = 0u64;

    for file_name in pool.get_result_file_names(job.id).await? {
        let rows = pool.get_exportable_results(job.id, &file_name).await?;
        if rows.is_empty() {
            continue;
        }

        match render_group_csv(&rows) {
            Ok(bytes) => {
                let count = rows.len() as u64;
                final_records += count;
                per_file_counts.push((file_name.clone(), count));
                csv_files.push((enriched_name(&file_name), bytes));
            }
            Err(e) => {
                warn!("Job {}: failed to package group {}: {}", job.id, file_name, e);
                failed_groups += 1;
            }
        }
    }

    if failed_groups > 0 {
        warn!(
            "Job {}: {} source file group(s) were skipped during packaging",
            job.id, failed_groups
        );
    }

    let summary = render_summary(job, final_records, &per_file_counts);
    let artifact_path = artifact_dir.join(format!("job-{}.zip", job.id));

    // The zip writer is synchronous; the bundle is written in a blocking task.
    let path = artifact_path.clone();
    tokio::task::spawn_blocking(move || -> AppResult<()> {
        let file = File::create(&path)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        for (name, bytes) in &csv_files {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        zip.start_file("enrichment_summary.txt", options)?;
        zip.write_all(summary.as_bytes())?;

        zip.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Archive(format!("Packaging task failed: {}", e)))??;

    let size_bytes = tokio::fs::metadata(&artifact_path).await?.len() as i64;

    info!(
        "Job {}: artifact written to {} ({} bytes, {} record(s))",
        job.id,
        artifact_path.display(),
        size_bytes,
        final_records
    );

    Ok(PackageOutcome {
        artifact_path,
        size_bytes,
        final_records,
        failed_groups,
    })
}

/// Output file name for a source file: `contacts.csv` -> `contacts_enriched.csv`.
fn enriched_name(file_name: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    format!("{}_enriched.csv", stem)
}

/// Render one group's rows as CSV bytes.
///
/// The header is the sorted union of all field names seen in the group,
/// bookkeeping fields excluded. Enriched values take precedence over the
/// original row's values on key collision. Output is comma-delimited with
/// standard quoting.
fn render_group_csv(rows: &[enrichment_result::Model]) -> AppResult<Vec<u8>> {
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for row in rows {
        for source in [row.enriched_data.as_ref(), Some(&row.reference_data)] {
            if let Some(object) = source.and_then(|v| v.as_object()) {
                for key in object.keys() {
                    if !EXCLUDED_FIELDS.contains(&key.as_str()) {
                        columns.insert(key.clone());
                    }
                }
            }
        }
    }

    let columns: Vec<String> = columns.into_iter().collect();
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&columns)?;

    for row in rows {
        let enriched = row.enriched_data.as_ref().and_then(|v| v.as_object());
        let original = row.reference_data.as_object();

        let record: Vec<String> = columns
            .iter()
            .map(|column| {
                enriched
                    .and_then(|o| o.get(column))
                    .or_else(|| original.and_then(|o| o.get(column)))
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Csv(e.to_string()))
}

/// Render the human-readable summary shipped inside the artifact.
fn render_summary(
    job: &enrichment_job::Model,
    final_records: u64,
    per_file_counts: &[(String, u64)],
) -> String {
    let mut out = String::new();
    out.push_str("Enrichment summary\n");
    out.push_str("==================\n\n");
    out.push_str(&format!("Job:            {}\n", job.id));
    out.push_str(&format!("Input:          {}\n", job.file_name));
    out.push_str(&format!(
        "Generated:      {}\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Rows imported:  {}\n", job.total_records));
    out.push_str(&format!("Rows matched:   {}\n", job.matched_records));
    out.push_str(&format!("Rows filtered:  {}\n", job.filtered_records));
    out.push_str(&format!("Rows exported:  {}\n\n", final_records));

    if !per_file_counts.is_empty() {
        out.push_str("Per file:\n");
        for (file_name, count) in per_file_counts {
            out.push_str(&format!("  {}: {} row(s)\n", file_name, count));
        }
        out.push('\n');
    }

    out.push_str("Processing steps:\n");
    out.push_str("  1. Input files extracted and classified\n");
    out.push_str("  2. Rows mapped and loaded into staging\n");
    out.push_str("  3. Address fingerprints computed\n");
    out.push_str("  4. Rows matched against the reference store\n");
    out.push_str("  5. Blacklisted phone numbers filtered out\n");
    out.push_str("  6. Enriched files packaged into this archive\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn result_row(
        enriched: Option<serde_json::Value>,
        reference: serde_json::Value,
    ) -> enrichment_result::Model {
        enrichment_result::Model {
            id: 1,
            job_id: uuid::Uuid::nil(),
            file_name: "contacts.csv".to_string(),
            hexacle_hash: "H".to_string(),
            found_match: enriched.is_some(),
            enriched_data: enriched,
            reference_data: reference,
            is_blacklisted: false,
            blacklist_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_enriched_name() {
        assert_eq!(enriched_name("contacts.csv"), "contacts_enriched.csv");
        assert_eq!(enriched_name("dir/export.CSV"), "export_enriched.csv");
    }

    #[test]
    fn test_group_csv_union_header_sorted_and_excludes_bookkeeping() {
        let rows = vec![
            result_row(
                Some(json!({"email": "a@b.fr", "last_name": "Doe"})),
                json!({"ville": "Paris", "source_id": "contacts.csv#2"}),
            ),
            result_row(
                Some(json!({"mobile_phone": "0612345678"})),
                json!({"cod_post": "75002", "source_id": "contacts.csv#3"}),
            ),
        ];

        let bytes = render_group_csv(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();

        assert_eq!(header, "cod_post,email,last_name,mobile_phone,ville");
        assert!(!text.contains("source_id"));
    }

    #[test]
    fn test_group_csv_enriched_values_win() {
        let rows = vec![result_row(
            Some(json!({"ville": "PARIS"})),
            json!({"ville": "paris"}),
        )];

        let text = String::from_utf8(render_group_csv(&rows).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "ville");
        assert_eq!(lines.next().unwrap(), "PARIS");
    }
}
