//! End-to-end pipeline tests against a temporary SQLite database.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use contact_enrich_lib::config::{Config, Environment};
use contact_enrich_lib::db::DbPool;
use contact_enrich_lib::error::AppError;
use contact_enrich_lib::models::{
    ImportRecord, JobCounters, JobStatus, JobStatusResponse, QueryJobsParams,
};
use contact_enrich_lib::services::cleanup::{run_cleanup, CleanupConfig};
use contact_enrich_lib::services::mapping::ColumnMapping;
use contact_enrich_lib::services::orchestrator::{self, JobInput};
use contact_enrich_lib::services::{matcher, Enricher};

struct TestEnv {
    // Held for its Drop; removes all scratch files
    _dir: TempDir,
    root: PathBuf,
    pool: DbPool,
    config: Arc<Config>,
    enricher: Enricher,
}

async fn setup() -> TestEnv {
    setup_with_batch_size(500).await
}

async fn setup_with_batch_size(import_batch_size: usize) -> TestEnv {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().to_path_buf();

    let database_url = format!(
        "sqlite://{}?mode=rwc",
        root.join("test.sqlite").display()
    );
    let pool = DbPool::connect(&database_url).await.expect("db connect");

    let config = Arc::new(Config {
        environment: Environment::Development,
        database_url,
        data_dir: root.join("data"),
        artifact_dir: root.join("artifacts"),
        import_batch_size,
        blacklist_batch_size: 1000,
        lookup_chunk_size: 200,
        artifact_retention_hours: 168,
    });

    let enricher = Enricher::new(pool.clone(), config.clone());

    TestEnv {
        _dir: dir,
        root,
        pool,
        config,
        enricher,
    }
}

fn write_file(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

const REFERENCE_CSV: &str = "\
numero,voie,ville,cod_post,first_name,last_name,email,mobile_phone,landline_phone,address,city,postal_code
12,rue de la Paix,Paris,75002,John,Doe,john.doe@example.fr,0612345678,0145678901,12 rue de la Paix,Paris,75002
34,avenue Foch,Lyon,69006,Jane,Martin,jane.martin@example.fr,0698765432,,34 avenue Foch,Lyon,69006
";

const MAPPING_JSON: &str = r#"{"Numero": "numero", "Street": "voie", "City": "ville", "Zip": "cod_post"}"#;

async fn seed_reference(env: &TestEnv) {
    let path = env.root.join("reference.csv");
    write_file(&path, REFERENCE_CSV);
    let report = env.enricher.load_reference_csv(&path).await.unwrap();
    assert_eq!(report.rows_inserted, 2);
}

async fn wait_terminal(env: &TestEnv, job_id: Uuid) -> JobStatusResponse {
    for _ in 0..100 {
        let status = env.enricher.status(job_id).await.unwrap();
        if status.status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("job {} did not reach a terminal state", job_id);
}

fn read_zip_entry(zip_path: &str, entry_name: &str) -> String {
    let mut archive = ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
    let mut entry = archive.by_name(entry_name).unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

#[tokio::test]
async fn csv_job_enriches_matches_and_filters_blacklisted() {
    let env = setup().await;
    seed_reference(&env).await;

    // Jane's mobile is opted out
    let blacklist_path = env.root.join("blacklist_optout.csv");
    write_file(&blacklist_path, "phone\n0698765432\n");
    let report = env.enricher.ingest_blacklist_csv(&blacklist_path).await.unwrap();
    assert_eq!(report.rows_inserted, 1);

    let input_path = env.root.join("contacts.csv");
    write_file(
        &input_path,
        "Numero,Street,City,Zip\n\
         12,rue de la Paix,Paris,75002\n\
         34,avenue Foch,Lyon,69006\n\
         99,chemin Inconnu,Nulle Part,00000\n\
         ,,,\n",
    );

    let job_id = env.enricher.submit(input_path, MAPPING_JSON).await.unwrap();
    let status = wait_terminal(&env, job_id).await;

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.counters.total_records, 3); // all-empty row skipped
    assert_eq!(status.counters.processed_records, 3);
    assert_eq!(status.counters.enriched_records, 3);
    assert_eq!(status.counters.matched_records, 2);
    assert_eq!(status.counters.filtered_records, 1); // Jane suppressed
    assert_eq!(status.counters.final_records, 1); // only John ships
    assert!(status.error_message.is_none());

    let artifact = status.result_download_url.expect("artifact path");
    assert!(status.result_size_bytes.unwrap() > 0);

    let csv_text = read_zip_entry(&artifact, "contacts_enriched.csv");
    assert!(csv_text.contains("john.doe@example.fr"));
    assert!(csv_text.contains("0612345678"));
    assert!(!csv_text.contains("jane.martin@example.fr"));
    assert_eq!(csv_text.lines().count(), 2); // header + John

    let summary = read_zip_entry(&artifact, "enrichment_summary.txt");
    assert!(summary.contains(&job_id.to_string()));
    assert!(summary.contains("Rows imported:  3"));
    assert!(summary.contains("Rows filtered:  1"));
    assert!(summary.contains("Rows exported:  1"));
}

#[tokio::test]
async fn zip_job_ingests_bundled_blacklist() {
    let env = setup().await;
    seed_reference(&env).await;

    // Semicolon-delimited contacts plus a blacklist file in one archive
    let zip_path = env.root.join("drop.zip");
    {
        let mut zip = ZipWriter::new(File::create(&zip_path).unwrap());
        let options = SimpleFileOptions::default();

        zip.start_file("contacts.csv", options).unwrap();
        zip.write_all(
            b"Numero;Street;City;Zip\n\
              12;rue de la Paix;Paris;75002\n\
              34;avenue Foch;Lyon;69006\n",
        )
        .unwrap();

        zip.start_file("blacklist.csv", options).unwrap();
        zip.write_all(b"phone\n06 12 34 56 78\n").unwrap();

        zip.start_file("notes.txt", options).unwrap();
        zip.write_all(b"ignore me").unwrap();

        zip.finish().unwrap();
    }

    let job_id = env.enricher.submit(zip_path, MAPPING_JSON).await.unwrap();
    let status = wait_terminal(&env, job_id).await;

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.counters.total_records, 2);
    assert_eq!(status.counters.matched_records, 2);
    // John's mobile came in via the bundled blacklist, spaces and all
    assert_eq!(status.counters.filtered_records, 1);
    assert_eq!(status.counters.final_records, 1);

    let artifact = status.result_download_url.unwrap();
    let csv_text = read_zip_entry(&artifact, "contacts_enriched.csv");
    assert!(csv_text.contains("jane.martin@example.fr"));
    assert!(!csv_text.contains("john.doe@example.fr"));
}

#[tokio::test]
async fn submit_rejects_unusable_mapping() {
    let env = setup().await;

    let input_path = env.root.join("contacts.csv");
    write_file(&input_path, "A,B\n1,2\n");

    let result = env
        .enricher
        .submit(input_path, r#"{"A": "not_a_column"}"#)
        .await;
    assert!(matches!(result, Err(AppError::Mapping(_))));
}

#[tokio::test]
async fn job_with_no_importable_rows_fails() {
    let env = setup().await;

    let input_path = env.root.join("contacts.csv");
    write_file(&input_path, "Other,Columns\nx,y\n");

    let job_id = env.enricher.submit(input_path, MAPPING_JSON).await.unwrap();
    let status = wait_terminal(&env, job_id).await;

    assert_eq!(status.status, JobStatus::Failed);
    assert!(status.error_message.unwrap().contains("No rows"));
}

#[tokio::test]
async fn terminal_jobs_cannot_be_cancelled_or_transitioned() {
    let env = setup().await;
    seed_reference(&env).await;

    let input_path = env.root.join("contacts.csv");
    write_file(&input_path, "Numero,Street,City,Zip\n12,rue de la Paix,Paris,75002\n");

    let job_id = env.enricher.submit(input_path, MAPPING_JSON).await.unwrap();
    let status = wait_terminal(&env, job_id).await;
    assert_eq!(status.status, JobStatus::Completed);

    assert!(matches!(
        env.enricher.cancel(job_id).await,
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        env.pool
            .transition_job(job_id, JobStatus::Processing, None)
            .await,
        Err(AppError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn status_of_unknown_job_is_not_found() {
    let env = setup().await;
    assert!(matches!(
        env.enricher.status(Uuid::now_v7()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_jobs_filters_by_status() {
    let env = setup().await;
    seed_reference(&env).await;

    let good = env.root.join("contacts.csv");
    write_file(&good, "Numero,Street,City,Zip\n12,rue de la Paix,Paris,75002\n");
    let bad = env.root.join("empty.csv");
    write_file(&bad, "Other\nx\n");

    let good_id = env.enricher.submit(good, MAPPING_JSON).await.unwrap();
    let bad_id = env.enricher.submit(bad, MAPPING_JSON).await.unwrap();
    wait_terminal(&env, good_id).await;
    wait_terminal(&env, bad_id).await;

    let all = env
        .enricher
        .list_jobs(&QueryJobsParams::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);

    let failed = env
        .enricher
        .list_jobs(&QueryJobsParams {
            status: Some(JobStatus::Failed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failed.total, 1);
    assert_eq!(failed.jobs[0].id, bad_id);
}

#[tokio::test]
async fn cleanup_deletes_expired_artifacts_and_staging_rows() {
    let env = setup().await;
    seed_reference(&env).await;

    let input_path = env.root.join("contacts.csv");
    write_file(&input_path, "Numero,Street,City,Zip\n12,rue de la Paix,Paris,75002\n");

    let job_id = env.enricher.submit(input_path, MAPPING_JSON).await.unwrap();
    let status = wait_terminal(&env, job_id).await;
    assert_eq!(status.status, JobStatus::Completed);

    let artifact = PathBuf::from(status.result_download_url.unwrap());
    assert!(artifact.exists());
    assert!(env.pool.count_staging_records(job_id).await.unwrap() > 0);

    // Zero-hour retention expires everything that is already terminal
    tokio::time::sleep(Duration::from_millis(20)).await;
    let cleanup_config = CleanupConfig {
        artifact_dir: env.config.artifact_dir.clone(),
        retention_hours: 0,
        interval_secs: 3600,
    };
    run_cleanup(&env.pool, &cleanup_config).await.unwrap();

    assert!(!artifact.exists());
    assert_eq!(env.pool.count_staging_records(job_id).await.unwrap(), 0);

    let after = env.enricher.status(job_id).await.unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert!(after.result_download_url.is_none());
    // Committed counters survive cleanup
    assert_eq!(after.counters.final_records, 1);
}

#[tokio::test]
async fn failed_result_batches_are_not_counted_as_matched() {
    use contact_enrich_lib::config::EnrichmentConfig;
    use sea_orm::ConnectionTrait;

    let env = setup().await;
    seed_reference(&env).await;
    let config = EnrichmentConfig::default();

    // One staging row that would match John
    let job_id = Uuid::now_v7();
    env.pool.insert_job(job_id, "contacts.csv").await.unwrap();
    let record = ImportRecord {
        source_id: "contacts.csv#2".to_string(),
        numero: Some("12".to_string()),
        voie: Some("rue de la Paix".to_string()),
        ville: Some("Paris".to_string()),
        cod_post: Some("75002".to_string()),
        ..Default::default()
    };
    env.pool
        .insert_staging_batch(job_id, "contacts.csv", &[(record, serde_json::json!({}))])
        .await
        .unwrap();
    matcher::compute_fingerprints(&env.pool, job_id, &config)
        .await
        .unwrap();

    // Make every result insert fail
    env.pool
        .connection()
        .execute_unprepared("DROP TABLE enrichment_results;")
        .await
        .unwrap();

    let stats = matcher::match_job_records(&env.pool, job_id, &config)
        .await
        .unwrap();

    assert_eq!(stats.enriched, 0);
    assert_eq!(stats.matched, 0); // the match existed but never materialized
    assert!(!stats.errors.is_empty());
}

#[tokio::test]
async fn cancelled_job_finalizes_as_failed_with_committed_counters() {
    let env = setup().await;
    seed_reference(&env).await;

    let input_path = env.root.join("contacts.csv");
    write_file(
        &input_path,
        "Numero,Street,City,Zip\n12,rue de la Paix,Paris,75002\n",
    );

    // Cancel while the job is still pending, then run the pipeline; the
    // first cooperative check must stop it
    let job_id = Uuid::now_v7();
    env.pool.insert_job(job_id, "contacts.csv").await.unwrap();
    env.enricher.cancel(job_id).await.unwrap();

    orchestrator::run_enrichment_job(
        env.pool.clone(),
        env.config.enrichment_config(),
        job_id,
        JobInput {
            path: input_path,
            file_name: "contacts.csv".to_string(),
            mapping: ColumnMapping::parse(MAPPING_JSON).unwrap(),
        },
        env.config.data_dir.clone(),
        env.config.artifact_dir.clone(),
    )
    .await;

    let status = env.enricher.status(job_id).await.unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert_eq!(status.error_message.as_deref(), Some("cancelled"));
    // Nothing was committed before the cancel took effect, and nothing was
    // produced after it
    assert_eq!(status.counters.total_records, 0);
    assert!(status.result_download_url.is_none());
    assert!(status.completed_at.is_some());
}

fn assert_monotonic(previous: &JobCounters, current: &JobCounters) {
    assert!(current.total_records >= previous.total_records);
    assert!(current.processed_records >= previous.processed_records);
    assert!(current.matched_records >= previous.matched_records);
    assert!(current.enriched_records >= previous.enriched_records);
    assert!(current.filtered_records >= previous.filtered_records);
    assert!(current.final_records >= previous.final_records);
}

#[tokio::test]
async fn counters_only_grow_while_job_is_active() {
    // Small batches force many flush/commit points to sample across
    let env = setup_with_batch_size(2).await;
    seed_reference(&env).await;

    let mut contents = String::from("Numero,Street,City,Zip\n");
    for _ in 0..30 {
        contents.push_str("12,rue de la Paix,Paris,75002\n");
    }
    let input_path = env.root.join("contacts.csv");
    write_file(&input_path, &contents);

    let job_id = env.enricher.submit(input_path, MAPPING_JSON).await.unwrap();

    let mut previous = JobCounters::default();
    let status = loop {
        let status = env.enricher.status(job_id).await.unwrap();
        assert_monotonic(&previous, &status.counters);
        previous = status.counters;
        if status.status.is_terminal() {
            break status;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    };

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.counters.total_records, 30);
    assert_eq!(status.counters.processed_records, 30);
    assert_eq!(status.counters.matched_records, 30);
    assert_eq!(status.counters.enriched_records, 30);
    assert_eq!(status.counters.final_records, 30);
}
