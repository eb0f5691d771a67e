//! Database access layer.
//!
//! Query modules extend `DbPool` with `impl` blocks, one module per table.

mod blacklist;
mod jobs;
mod reference;
mod results;
mod staging;

pub use results::NewResult;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::migration::Migrator;

/// Shared database handle. Cheap to clone; SeaORM pools internally.
#[derive(Clone)]
pub struct DbPool {
    connection: DatabaseConnection,
}

impl DbPool {
    /// Connect to the database and run pending migrations.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let connection = Database::connect(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        Migrator::up(&connection, None)
            .await
            .map_err(|e| AppError::Database(format!("Failed to run migrations: {}", e)))?;

        info!("Database ready at {}", database_url);

        Ok(Self { connection })
    }

    /// Access the underlying SeaORM connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}
