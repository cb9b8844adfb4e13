//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Batchfeed configuration file.

use crate::config::load_config;
use crate::config::schema::{DatabaseTarget, TransferBackend};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2); // Configuration error exit code
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Work Dir: {}", config.workspace.work_dir.display());

        match config.database_target {
            DatabaseTarget::PostgreSQL => {
                if let Some(ref pg_config) = config.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Database Target: PostgreSQL");
                    println!(
                        "  PostgreSQL Connection: {}",
                        pg_config
                            .connection_string
                            .expose_secret()
                            .as_str()
                            .split('@')
                            .next_back()
                            .unwrap_or("***")
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                    println!("  SSL Mode: {}", pg_config.ssl_mode);
                }
            }
            DatabaseTarget::Memory => println!("  Database Target: memory (nothing persists)"),
        }

        match config.transfer.backend {
            TransferBackend::Sftp => {
                if let Some(ref sftp) = config.transfer.sftp {
                    println!("  Transfer: sftp://{}@{}:{}", sftp.username, sftp.host, sftp.port);
                    println!(
                        "  Host Key Check: {}",
                        if sftp.known_hosts_path.is_some() { "on" } else { "off" }
                    );
                }
            }
            TransferBackend::Local => {
                if let Some(ref local) = config.transfer.local {
                    println!("  Transfer: local ({})", local.root.display());
                }
            }
            TransferBackend::Disabled => println!("  Transfer: disabled"),
        }
        println!("  Upload Dir: {}", config.transfer.upload_dir);
        println!("  Inbox Dir: {}", config.transfer.inbox_dir);
        println!(
            "  Recipient Keys: {}",
            config.encryption.recipient_public_keys.len()
        );
        if config.encryption.allow_unencrypted_fallback {
            println!("  ⚠️  Unencrypted fallback is ENABLED");
        }
        println!(
            "  Poller: every {}s, {} at a time",
            config.poller.interval_seconds, config.poller.max_concurrent
        );
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_configuration_error() {
        let code = ValidateArgs {}
            .execute("/nonexistent/batchfeed.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
