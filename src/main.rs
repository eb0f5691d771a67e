//! Contact Enrichment Server - Main entry point.
//!
//! Connects to the database, starts the retention task, and processes the
//! input files given on the command line.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use contact_enrich_lib::config::Config;
use contact_enrich_lib::db::DbPool;
use contact_enrich_lib::models::{JobStatus, QueryJobsParams};
use contact_enrich_lib::services::{self, CleanupConfig, Enricher};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Contact Enrichment Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for DATABASE_URL");
    }

    // Create data directories
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .expect("Failed to create data directory");
    tokio::fs::create_dir_all(&config.artifact_dir)
        .await
        .expect("Failed to create artifact directory");

    // Connect and migrate
    let pool = DbPool::connect(&config.database_url)
        .await
        .expect("Failed to initialize database");
    info!("Database ready");

    // Start the cleanup background task
    let cleanup_config = CleanupConfig {
        artifact_dir: config.artifact_dir.clone(),
        retention_hours: config.artifact_retention_hours,
        interval_secs: if config.is_development() { 60 } else { 3600 }, // 1 min dev, 1 hour prod
    };
    services::start_cleanup_task(pool.clone(), cleanup_config);
    info!(
        "Cleanup service started (artifact retention: {} hours)",
        config.artifact_retention_hours
    );

    let config = Arc::new(config);
    let enricher = Enricher::new(pool, config.clone());

    // CLI: <mapping.json> <input.csv|input.zip>...
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        error!("Usage: contact-enrich-server <mapping.json> <input.csv|input.zip>...");
        std::process::exit(2);
    }

    let mapping_json = tokio::fs::read_to_string(&args[0])
        .await
        .expect("Failed to read mapping file");

    let mut job_ids = Vec::new();
    for input in &args[1..] {
        match enricher.submit(PathBuf::from(input), &mapping_json).await {
            Ok(job_id) => {
                info!("Submitted {} as job {}", input, job_id);
                job_ids.push(job_id);
            }
            Err(e) => error!("Failed to submit {}: {}", input, e),
        }
    }

    // Poll until every submitted job reaches a terminal state
    for job_id in job_ids {
        loop {
            let status = enricher.status(job_id).await.expect("Job vanished");
            if status.status.is_terminal() {
                match status.status {
                    JobStatus::Completed => info!(
                        "Job {} completed: {} record(s) exported to {}",
                        job_id,
                        status.counters.final_records,
                        status.result_download_url.as_deref().unwrap_or("-")
                    ),
                    _ => error!(
                        "Job {} failed: {}",
                        job_id,
                        status.error_message.as_deref().unwrap_or("unknown error")
                    ),
                }
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    let listing = enricher
        .list_jobs(&QueryJobsParams::default())
        .await
        .expect("Failed to list jobs");
    info!("{} job(s) on record", listing.total);

    Ok(())
}
