//! Input archive handling: ZIP extraction and entry classification.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::ZipArchive;

use crate::error::{AppError, AppResult};

/// Role of an input file within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Contact rows to enrich.
    Contact,
    /// Opted-out phone numbers.
    Blacklist,
    /// Not a CSV; ignored.
    Skipped,
}

/// Classify an input file by name: CSVs whose file stem contains "blacklist"
/// carry phone opt-outs, every other CSV carries contact rows.
pub fn classify_entry(name: &str) -> EntryKind {
    let path = Path::new(name);

    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return EntryKind::Skipped;
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();

    if stem.contains("blacklist") {
        EntryKind::Blacklist
    } else {
        EntryKind::Contact
    }
}

/// The input files of a job after extraction, split by role.
#[derive(Debug, Default)]
pub struct ExtractedInput {
    pub contact_files: Vec<PathBuf>,
    pub blacklist_files: Vec<PathBuf>,
}

/// Prepare a job input for ingestion.
///
/// A `.zip` input is extracted into `work_dir` and its entries classified; a
/// bare `.csv` is classified directly. Anything else is rejected.
pub async fn prepare_input(input_path: &Path, work_dir: &Path) -> AppResult<ExtractedInput> {
    let extension = input_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "zip" => extract_zip(input_path, work_dir).await,
        "csv" => {
            let mut input = ExtractedInput::default();
            match classify_entry(&input_path.to_string_lossy()) {
                EntryKind::Blacklist => input.blacklist_files.push(input_path.to_path_buf()),
                _ => input.contact_files.push(input_path.to_path_buf()),
            }
            Ok(input)
        }
        other => Err(AppError::InvalidInput(format!(
            "Unsupported input file type '.{}' (expected .csv or .zip)",
            other
        ))),
    }
}

/// Extract a ZIP archive into `work_dir`, flattening entry paths.
async fn extract_zip(zip_path: &Path, work_dir: &Path) -> AppResult<ExtractedInput> {
    tokio::fs::create_dir_all(work_dir).await?;

    // The zip reader is synchronous; archives are extracted in a blocking task.
    let zip_path = zip_path.to_path_buf();
    let work_dir = work_dir.to_path_buf();

    let input = tokio::task::spawn_blocking(move || -> AppResult<ExtractedInput> {
        let file = File::open(&zip_path)?;
        let mut archive = ZipArchive::new(file)?;

        let mut input = ExtractedInput::default();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            // Guard against path traversal in entry names
            let Some(enclosed) = entry.enclosed_name() else {
                warn!("Skipping archive entry with unsafe path: {}", entry.name());
                continue;
            };
            let Some(file_name) = enclosed.file_name().map(|n| n.to_os_string()) else {
                continue;
            };

            let kind = classify_entry(&file_name.to_string_lossy());
            if kind == EntryKind::Skipped {
                warn!("Skipping non-CSV archive entry: {}", entry.name());
                continue;
            }

            // Entry paths are flattened; the same basename from different
            // archive directories must not clobber an earlier entry
            let mut target = work_dir.join(&file_name);
            if target.exists() {
                target = work_dir.join(format!("{}_{}", i, file_name.to_string_lossy()));
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;

            match kind {
                EntryKind::Contact => input.contact_files.push(target),
                EntryKind::Blacklist => input.blacklist_files.push(target),
                EntryKind::Skipped => unreachable!(),
            }
        }

        Ok(input)
    })
    .await
    .map_err(|e| AppError::Archive(format!("Extraction task failed: {}", e)))??;

    info!(
        "Extracted archive: {} contact file(s), {} blacklist file(s)",
        input.contact_files.len(),
        input.blacklist_files.len()
    );

    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_entry_names_do_not_clobber() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;
        use zip::ZipWriter;

        let dir = tempfile::TempDir::new().unwrap();
        let zip_path = dir.path().join("drop.zip");
        {
            let mut zip = ZipWriter::new(File::create(&zip_path).unwrap());
            let options = SimpleFileOptions::default();
            zip.start_file("a/contacts.csv", options).unwrap();
            zip.write_all(b"A\n1\n").unwrap();
            zip.start_file("b/contacts.csv", options).unwrap();
            zip.write_all(b"A\n2\n").unwrap();
            zip.finish().unwrap();
        }

        let input = prepare_input(&zip_path, &dir.path().join("work"))
            .await
            .unwrap();

        assert_eq!(input.contact_files.len(), 2);
        assert_ne!(input.contact_files[0], input.contact_files[1]);
        for path in &input.contact_files {
            assert!(path.exists());
        }
    }

    #[test]
    fn test_classify_entry() {
        assert_eq!(classify_entry("contacts.csv"), EntryKind::Contact);
        assert_eq!(classify_entry("dir/Blacklist_2026.CSV"), EntryKind::Blacklist);
        assert_eq!(classify_entry("blacklist.csv"), EntryKind::Blacklist);
        assert_eq!(classify_entry("readme.txt"), EntryKind::Skipped);
        assert_eq!(classify_entry("contacts"), EntryKind::Skipped);
    }
}
