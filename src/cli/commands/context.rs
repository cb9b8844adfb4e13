//! Shared setup for commands that need the repository and the gateway

use crate::adapters::database::{create_repository, BatchRepository};
use crate::adapters::transfer::{create_gateway, TransferGateway};
use crate::config::{load_config, BatchfeedConfig};
use crate::core::pipeline::BatchPipeline;
use crate::core::reply::ReplyProcessor;
use crate::domain::{BatchfeedError, InputRecord};
use crate::log_error_with_context;
use std::path::Path;
use std::sync::Arc;

/// Exit code for a failed operation
///
/// 2 configuration, 3 integrity or validation, 4 transport or database, 5 anything else.
pub fn exit_code_for(error: &BatchfeedError) -> i32 {
    if error.is_configuration() {
        return 2;
    }
    if error.is_integrity() || error.is_path_traversal() {
        return 3;
    }
    match error.root() {
        BatchfeedError::Validation(_)
        | BatchfeedError::NotFound(_)
        | BatchfeedError::Conflict(_) => 3,
        BatchfeedError::Transport(_) | BatchfeedError::Database(_) => 4,
        _ => 5,
    }
}

/// Prints a failure and returns its exit code
pub fn report(context: &str, error: &BatchfeedError) -> i32 {
    log_error_with_context!(error, context);
    println!("❌ {context}");
    println!("   Error: {error}");
    exit_code_for(error)
}

pub fn load(config_path: &str) -> Result<BatchfeedConfig, i32> {
    load_config(config_path).map_err(|e| {
        println!("❌ Failed to load configuration file");
        println!("   Error: {e}");
        2
    })
}

/// Reads a JSON file holding either one record or an array of records
pub fn read_records(path: &Path) -> Result<Vec<InputRecord>, BatchfeedError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        BatchfeedError::Validation(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let records = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(records)
}

/// Loaded configuration plus connected adapters
pub struct AppContext {
    pub config: BatchfeedConfig,
    pub repository: Arc<dyn BatchRepository>,
    pub gateway: Arc<dyn TransferGateway>,
}

impl AppContext {
    /// Loads the configuration and connects the adapters
    ///
    /// `dry_run` forces the disabled transfer backend on top of the file's setting.
    pub async fn connect(config_path: &str, dry_run: bool) -> Result<Self, i32> {
        let mut config = load(config_path)?;
        if dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        let repository = create_repository(&config)
            .await
            .map_err(|e| report("Failed to connect to database", &e))?;
        let gateway =
            create_gateway(&config).map_err(|e| report("Failed to set up transfer", &e))?;

        Ok(Self {
            config,
            repository,
            gateway,
        })
    }

    pub fn pipeline(&self) -> BatchPipeline {
        BatchPipeline::new(
            &self.config,
            Arc::clone(&self.repository),
            Arc::clone(&self.gateway),
        )
    }

    pub fn processor(&self) -> Result<ReplyProcessor, BatchfeedError> {
        ReplyProcessor::new(
            &self.config,
            Arc::clone(&self.repository),
            Arc::clone(&self.gateway),
        )
    }
}
