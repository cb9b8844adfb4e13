//! Transfer gateway factory

use crate::adapters::transfer::disabled::DisabledTransferGateway;
use crate::adapters::transfer::local::LocalTransferGateway;
use crate::adapters::transfer::sftp::SftpTransferGateway;
use crate::adapters::transfer::traits::TransferGateway;
use crate::config::schema::{BatchfeedConfig, TransferBackend};
use crate::domain::{BatchfeedError, Result};
use std::sync::Arc;

/// Create the gateway for the configured backend
///
/// `application.dry_run` always yields the disabled backend.
///
/// # Errors
///
/// Returns a configuration error when the selected backend has no section.
pub fn create_gateway(config: &BatchfeedConfig) -> Result<Arc<dyn TransferGateway>> {
    if config.application.dry_run {
        tracing::info!("DRY RUN: transfer gateway disabled");
        return Ok(Arc::new(DisabledTransferGateway));
    }

    let gateway: Arc<dyn TransferGateway> = match config.transfer.backend {
        TransferBackend::Sftp => {
            let sftp = config.transfer.sftp.as_ref().ok_or_else(|| {
                BatchfeedError::Configuration("transfer.sftp section is missing".to_string())
            })?;
            Arc::new(SftpTransferGateway::new(sftp.clone()))
        }
        TransferBackend::Local => {
            let local = config.transfer.local.as_ref().ok_or_else(|| {
                BatchfeedError::Configuration("transfer.local section is missing".to_string())
            })?;
            Arc::new(LocalTransferGateway::new(local.root.clone()))
        }
        TransferBackend::Disabled => Arc::new(DisabledTransferGateway),
    };

    tracing::info!(backend = gateway.name(), "Transfer gateway created");
    Ok(gateway)
}
