//! No-op transfer backend for development and dry runs

use crate::adapters::transfer::traits::{remote_join, TransferGateway};
use crate::domain::{BatchfeedError, Result};
use std::path::Path;

/// Logs uploads instead of sending them; the inbox is always empty
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTransferGateway;

impl TransferGateway for DisabledTransferGateway {
    fn upload(&self, local_file: &Path, remote_dir: &str) -> Result<String> {
        let file_name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let remote = remote_join(remote_dir, file_name);
        tracing::warn!(
            local = %local_file.display(),
            remote = %remote,
            "Transfer disabled: upload skipped"
        );
        Ok(remote)
    }

    fn download(&self, remote_file: &str, _local_file: &Path) -> Result<()> {
        Err(BatchfeedError::Transport(format!(
            "Transfer disabled: cannot download {remote_file}"
        )))
    }

    fn list(&self, _remote_dir: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn delete(&self, remote_file: &str) -> Result<()> {
        tracing::debug!(remote = %remote_file, "Transfer disabled: delete skipped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
