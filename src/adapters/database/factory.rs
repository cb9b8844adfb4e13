//! Repository factory
//!
//! Builds the repository selected by `database_target`.

use crate::adapters::database::memory::InMemoryBatchRepository;
use crate::adapters::database::traits::BatchRepository;
use crate::adapters::postgresql::{PostgreSQLBatchRepository, PostgreSQLClient};
use crate::config::schema::{BatchfeedConfig, DatabaseTarget};
use crate::domain::{BatchfeedError, Result};
use std::sync::Arc;

/// Create the batch repository for the configured target and make sure its schema exists
///
/// # Errors
///
/// Returns an error if the PostgreSQL section is missing or the database
/// cannot be reached.
pub async fn create_repository(config: &BatchfeedConfig) -> Result<Arc<dyn BatchRepository>> {
    let repository: Arc<dyn BatchRepository> = match config.database_target {
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                BatchfeedError::Configuration(
                    "database_target is postgresql but [postgresql] is missing".to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL batch repository");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            Arc::new(PostgreSQLBatchRepository::new(client))
        }
        DatabaseTarget::Memory => {
            tracing::info!("Creating in-memory batch repository; state is lost on exit");
            Arc::new(InMemoryBatchRepository::new())
        }
    };

    repository.ensure_schema().await?;
    Ok(repository)
}
