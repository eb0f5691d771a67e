//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_DATABASE_URL: &str = "sqlite:data/enrichment.sqlite?mode=rwc";
    pub const DEV_DATA_DIR: &str = "data";
    pub const DEV_ARTIFACT_DIR: &str = "data/artifacts";
    pub const DEV_IMPORT_BATCH_SIZE: usize = 500;
    pub const DEV_BLACKLIST_BATCH_SIZE: usize = 1000;
    pub const DEV_LOOKUP_CHUNK_SIZE: usize = 200;
    pub const DEV_ARTIFACT_RETENTION_HOURS: u64 = 168; // 7 days
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Database URL (SQLite connection string)
    pub database_url: String,
    /// Directory for working data (extracted archives, staging scratch)
    pub data_dir: PathBuf,
    /// Directory where result artifacts are written
    pub artifact_dir: PathBuf,
    /// Staging insert batch size for CSV import
    pub import_batch_size: usize,
    /// Insert batch size for blacklist ingestion
    pub blacklist_batch_size: usize,
    /// Number of hashes per reference-store lookup query
    pub lookup_chunk_size: usize,
    /// Result artifact retention in hours (cleanup task)
    pub artifact_retention_hours: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode (RUST_ENV=development) every variable has a
    /// sensible default; in production DATABASE_URL must be set explicitly.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `DATABASE_URL`: SQLite connection string (required in production)
    /// - `CES_DATA_DIR`: Working data directory (default: data)
    /// - `CES_ARTIFACT_DIR`: Result artifact directory (default: data/artifacts)
    /// - `CES_IMPORT_BATCH_SIZE`: Staging insert batch size (default: 500)
    /// - `CES_BLACKLIST_BATCH_SIZE`: Blacklist insert batch size (default: 1000)
    /// - `CES_LOOKUP_CHUNK_SIZE`: Hashes per reference lookup query (default: 200)
    /// - `CES_ARTIFACT_RETENTION_HOURS`: Artifact retention (default: 168)
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DEV_DATABASE_URL.to_string());

        let data_dir = env::var("CES_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::DEV_DATA_DIR));

        let artifact_dir = env::var("CES_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::DEV_ARTIFACT_DIR));

        let import_batch_size = env::var("CES_IMPORT_BATCH_SIZE")
            .unwrap_or_else(|_| defaults::DEV_IMPORT_BATCH_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("CES_IMPORT_BATCH_SIZE must be a valid number"))?;

        let blacklist_batch_size = env::var("CES_BLACKLIST_BATCH_SIZE")
            .unwrap_or_else(|_| defaults::DEV_BLACKLIST_BATCH_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("CES_BLACKLIST_BATCH_SIZE must be a valid number")
            })?;

        let lookup_chunk_size = env::var("CES_LOOKUP_CHUNK_SIZE")
            .unwrap_or_else(|_| defaults::DEV_LOOKUP_CHUNK_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("CES_LOOKUP_CHUNK_SIZE must be a valid number"))?;

        let artifact_retention_hours = env::var("CES_ARTIFACT_RETENTION_HOURS")
            .unwrap_or_else(|_| defaults::DEV_ARTIFACT_RETENTION_HOURS.to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("CES_ARTIFACT_RETENTION_HOURS must be a valid number")
            })?;

        let config = Config {
            environment,
            database_url,
            data_dir,
            artifact_dir,
            import_batch_size,
            blacklist_batch_size,
            lookup_chunk_size,
            artifact_retention_hours,
        };

        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.database_url == defaults::DEV_DATABASE_URL {
            errors.push(format!(
                "DATABASE_URL is using development default '{}'. Set a production database path.",
                defaults::DEV_DATABASE_URL
            ));
        }

        if self.import_batch_size == 0 || self.blacklist_batch_size == 0 {
            errors.push("Batch sizes must be greater than zero.".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }

    /// Default per-job settings derived from this configuration.
    pub fn enrichment_config(&self) -> EnrichmentConfig {
        EnrichmentConfig {
            import_batch_size: self.import_batch_size,
            blacklist_batch_size: self.blacklist_batch_size,
            lookup_chunk_size: self.lookup_chunk_size,
            delimiter: None,
            has_headers: true,
        }
    }
}

/// Per-job pipeline settings, snapshotted at job start.
///
/// The orchestrator never reads live global state mid-pipeline; everything it
/// needs is captured here when the job is submitted.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Staging insert batch size
    pub import_batch_size: usize,
    /// Blacklist insert batch size
    pub blacklist_batch_size: usize,
    /// Hashes per reference lookup query
    pub lookup_chunk_size: usize,
    /// Input CSV field delimiter; None sniffs comma vs semicolon from the header
    pub delimiter: Option<u8>,
    /// Whether input CSVs carry a header row
    pub has_headers: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        EnrichmentConfig {
            import_batch_size: defaults::DEV_IMPORT_BATCH_SIZE,
            blacklist_batch_size: defaults::DEV_BLACKLIST_BATCH_SIZE,
            lookup_chunk_size: defaults::DEV_LOOKUP_CHUNK_SIZE,
            delimiter: None,
            has_headers: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> Config {
        Config {
            environment: Environment::Development,
            database_url: "sqlite::memory:".to_string(),
            data_dir: PathBuf::from("data"),
            artifact_dir: PathBuf::from("data/artifacts"),
            import_batch_size: 500,
            blacklist_batch_size: 1000,
            lookup_chunk_size: 200,
            artifact_retention_hours: 168,
        }
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::parse("development"),
            Some(Environment::Development)
        );
        assert_eq!(Environment::parse("dev"), Some(Environment::Development));
        assert_eq!(
            Environment::parse("production"),
            Some(Environment::Production)
        );
        assert_eq!(Environment::parse("prod"), Some(Environment::Production));
        assert_eq!(Environment::parse("invalid"), None);
    }

    #[test]
    fn test_production_validation_fails_with_dev_defaults() {
        let mut config = dev_config();
        config.environment = Environment::Production;
        config.database_url = defaults::DEV_DATABASE_URL.to_string();

        let result = config.validate_production();
        assert!(result.is_err());
    }

    #[test]
    fn test_production_validation_passes_with_proper_config() {
        let mut config = dev_config();
        config.environment = Environment::Production;
        config.database_url = "sqlite:/var/lib/ces/enrichment.sqlite?mode=rwc".to_string();

        assert!(config.validate_production().is_ok());
    }

    #[test]
    fn test_enrichment_config_snapshot() {
        let config = dev_config();
        let job_config = config.enrichment_config();
        assert_eq!(job_config.import_batch_size, 500);
        assert_eq!(job_config.blacklist_batch_size, 1000);
        assert!(job_config.delimiter.is_none());
        assert!(job_config.has_headers);
    }
}
